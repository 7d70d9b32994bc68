//! CSV serialization and atomic output writing.
//!
//! Retained rows are serialized with minimal RFC 4180 quoting, encoded in the
//! requested output encoding and written through a temporary file in the
//! destination directory. The temporary file only replaces the output path
//! once everything succeeded, so a failed run never leaves a half-written
//! output behind and never clobbers an existing file.
//!
//! # Example
//!
//! ```no_run
//! use sjis_dedupe::dedupe::Row;
//! use sjis_dedupe::output::{write_rows, WriteOptions};
//! use std::path::Path;
//!
//! let rows: Vec<Row> = vec![["a", "b"].into_iter().collect()];
//! let summary = write_rows(&rows, Path::new("out.csv"), &WriteOptions::default()).unwrap();
//! assert_eq!(summary.rows_written, 1);
//! ```

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::dedupe::Row;
use crate::encode::OutputEncoding;
use crate::error::DedupeError;

/// Record terminator written after every row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineTerminator {
    /// `\r\n`, the RFC 4180 terminator.
    #[default]
    Crlf,
    /// `\n`
    Lf,
}

impl LineTerminator {
    fn as_csv(self) -> csv::Terminator {
        match self {
            Self::Crlf => csv::Terminator::CRLF,
            Self::Lf => csv::Terminator::Any(b'\n'),
        }
    }

    fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Crlf => b"\r\n",
            Self::Lf => b"\n",
        }
    }
}

impl fmt::Display for LineTerminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crlf => write!(f, "crlf"),
            Self::Lf => write!(f, "lf"),
        }
    }
}

/// How retained rows are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub encoding: OutputEncoding,
    pub terminator: LineTerminator,
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub rows_written: usize,
    pub bytes_written: usize,
}

/// Serialize rows to CSV text.
///
/// A row without fields, read from a blank line, is written as a bare
/// terminator. A row holding one empty field is written as `""`.
///
/// # Errors
///
/// Returns [`DedupeError::Write`] if the CSV writer fails.
pub fn to_csv_string(rows: &[Row], terminator: LineTerminator) -> Result<String, DedupeError> {
    let mut builder = csv::WriterBuilder::new();
    builder
        .has_headers(false)
        .flexible(true)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(terminator.as_csv());

    let mut buffer = Vec::new();
    for group in rows.chunk_by(|a, b| a.is_empty() == b.is_empty()) {
        if group.first().is_some_and(Row::is_empty) {
            // The csv writer would emit `""` for an empty record.
            for _ in group {
                buffer.extend_from_slice(terminator.as_bytes());
            }
            continue;
        }
        let mut writer = builder.from_writer(&mut buffer);
        for row in group {
            writer.write_record(row.fields()).map_err(in_memory_error)?;
        }
        writer.flush().map_err(in_memory_error)?;
    }

    // Every field came from a `String`, so the buffer is valid UTF-8.
    String::from_utf8(buffer).map_err(in_memory_error)
}

fn in_memory_error<E: ToString>(e: E) -> DedupeError {
    DedupeError::Write {
        path: PathBuf::from("<memory>"),
        source: io::Error::new(io::ErrorKind::Other, e.to_string()),
    }
}

/// Serialize and encode rows into the bytes of an output file.
///
/// No rows produce no bytes at all, not even a byte order mark.
///
/// # Errors
///
/// Returns [`DedupeError::Encode`] naming the first retained row and column
/// that hold a character the encoding cannot represent.
pub fn render(rows: &[Row], options: &WriteOptions) -> Result<Vec<u8>, DedupeError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let text = to_csv_string(rows, options.terminator)?;
    let body = options.encoding.encode(&text).map_err(|failure| {
        let (row, column) = locate_unencodable(rows, &options.encoding).unwrap_or((0, 0));
        DedupeError::Encode {
            row,
            column,
            encoding: options.encoding.name().to_string(),
            detail: failure.to_string(),
        }
    })?;

    let bom = options.encoding.bom();
    let mut bytes = Vec::with_capacity(bom.len() + body.len());
    bytes.extend_from_slice(bom);
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// 1-based (row, column) of the first field the encoding cannot represent.
fn locate_unencodable(rows: &[Row], encoding: &OutputEncoding) -> Option<(usize, usize)> {
    rows.iter().enumerate().find_map(|(r, row)| {
        row.fields()
            .iter()
            .position(|field| !encoding.can_encode(field))
            .map(|c| (r + 1, c + 1))
    })
}

/// Write rows to `path`, replacing it atomically.
///
/// # Errors
///
/// - [`DedupeError::Encode`] if a field cannot be represented; nothing is
///   written in that case
/// - [`DedupeError::Write`] if the temporary file cannot be created, written
///   or moved into place
pub fn write_rows(
    rows: &[Row],
    path: &Path,
    options: &WriteOptions,
) -> Result<WriteSummary, DedupeError> {
    let bytes = render(rows, options)?;
    write_atomic(path, &bytes)?;
    log::debug!(
        "Wrote {} bytes ({}) to {}",
        bytes.len(),
        options.encoding,
        path.display()
    );

    Ok(WriteSummary {
        path: path.to_path_buf(),
        rows_written: rows.len(),
        bytes_written: bytes.len(),
    })
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DedupeError> {
    let write_error = |source: io::Error| DedupeError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(write_error)?;
    temp.write_all(bytes).map_err(write_error)?;
    temp.flush().map_err(write_error)?;
    // On error the temporary file is removed when `PersistError` drops it.
    temp.persist(path).map_err(|e| write_error(e.error))?;
    Ok(())
}
