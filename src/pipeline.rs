//! The decode → dedupe → write pipeline.
//!
//! Each stage runs to completion before the next starts. Any error aborts the
//! run; the output file is only replaced after every stage succeeded.

use std::path::Path;

use serde::Serialize;

use crate::config::PipelineOptions;
use crate::decode::decode_file;
use crate::dedupe::{dedupe_rows, parse_rows, DedupeStats};
use crate::error::DedupeError;
use crate::output::write_rows;

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// Candidate that decoded the input.
    pub input_encoding: &'static str,
    /// Name of the output encoding.
    pub output_encoding: &'static str,
    /// Size of the input file.
    pub bytes_read: usize,
    /// Size of the output file.
    pub bytes_written: usize,
    #[serde(flatten)]
    pub stats: DedupeStats,
}

/// Deduplicate `input` into `output`.
///
/// # Errors
///
/// Returns the first [`DedupeError`] raised by any stage.
pub fn run(
    input: &Path,
    output: &Path,
    options: &PipelineOptions,
) -> Result<PipelineReport, DedupeError> {
    let decoded = decode_file(input, &options.candidates)?;
    let input_encoding = decoded.encoding;

    let rows = parse_rows(&decoded.text)?;
    drop(decoded.text);

    let (retained, stats) = dedupe_rows(rows);
    log::info!(
        "Kept {} of {} rows ({} duplicates removed)",
        stats.rows_retained,
        stats.rows_read,
        stats.duplicates_removed
    );

    let summary = write_rows(&retained, output, &options.write)?;

    Ok(PipelineReport {
        input_encoding: input_encoding.name(),
        output_encoding: options.write.encoding.name(),
        bytes_read: decoded.bytes_read,
        bytes_written: summary.bytes_written,
        stats,
    })
}
