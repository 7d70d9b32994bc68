//! Structured error handling and exit codes.
//!
//! Every stage of the pipeline reports failures through [`DedupeError`].
//! The binary maps any failure to [`ExitCode::Failure`] and prints the
//! error's machine-readable code next to the message.

use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the sjis-dedupe application.
///
/// - 0: Success (output written)
/// - 1: Failure (any open, decode, parse, encode, write or config error)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the deduplicated file was written.
    Success = 0,
    /// Failure: the operation aborted and no output was produced.
    Failure = 1,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Errors produced by the decode, dedupe and write stages.
#[derive(Debug, Error)]
pub enum DedupeError {
    /// The input file could not be opened or read.
    #[error("cannot read input file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No candidate encoding decoded the whole input.
    #[error("cannot decode {} as any of [{tried}]: {detail}", .path.display())]
    Decode {
        path: PathBuf,
        /// Comma-separated list of the candidates that were attempted.
        tried: String,
        /// Failure reported by the last candidate.
        detail: String,
    },

    /// The decoded text is not well-formed CSV.
    #[error("malformed CSV at line {line}: {message}")]
    Parse { line: u64, message: String },

    /// A retained field cannot be represented in the output encoding.
    #[error("cannot encode row {row}, column {column} as {encoding}: {detail}")]
    Encode {
        /// 1-based position among the retained rows.
        row: usize,
        /// 1-based field position within the row.
        column: usize,
        encoding: String,
        detail: String,
    },

    /// The output file could not be created or written.
    #[error("cannot write output file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid configuration (unknown encoding label, bad config file).
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DedupeError {
    /// Machine-readable code printed next to the message.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Open { .. } => "SD010",
            Self::Decode { .. } => "SD020",
            Self::Parse { .. } => "SD030",
            Self::Encode { .. } => "SD040",
            Self::Write { .. } => "SD050",
            Self::Config(_) => "SD060",
        }
    }

    /// Short name of the error category.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Decode { .. } => "decode",
            Self::Parse { .. } => "parse",
            Self::Encode { .. } => "encode",
            Self::Write { .. } => "write",
            Self::Config(_) => "config",
        }
    }
}

/// Code used for errors that did not originate in the pipeline.
pub const GENERIC_ERROR_CODE: &str = "SD001";

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "SD020")
    pub code: String,
    /// The error category (e.g., "decode")
    pub kind: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        let (code, kind) = match err.downcast_ref::<DedupeError>() {
            Some(e) => (e.code(), e.kind()),
            None => (GENERIC_ERROR_CODE, "other"),
        };
        Self {
            code: code.to_string(),
            kind: kind.to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
        }
    }
}

/// Code prefix for an arbitrary application error.
#[must_use]
pub fn code_for(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<DedupeError>()
        .map_or(GENERIC_ERROR_CODE, DedupeError::code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::Failure.as_i32(), 1);
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = [
            DedupeError::Open {
                path: "in.csv".into(),
                source: io::Error::new(io::ErrorKind::NotFound, "missing"),
            },
            DedupeError::Decode {
                path: "in.csv".into(),
                tried: "shift_jis, cp932".into(),
                detail: "bad byte".into(),
            },
            DedupeError::Parse {
                line: 3,
                message: "unterminated quoted field".into(),
            },
            DedupeError::Encode {
                row: 1,
                column: 2,
                encoding: "Shift_JIS".into(),
                detail: "x".into(),
            },
            DedupeError::Write {
                path: "out.csv".into(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            },
            DedupeError::Config("bad".into()),
        ];
        let mut codes: Vec<_> = errors.iter().map(DedupeError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_structured_error_from_dedupe_error() {
        let err = anyhow::Error::new(DedupeError::Parse {
            line: 7,
            message: "unterminated quoted field".into(),
        });
        let structured = StructuredError::new(&err, ExitCode::Failure);
        assert_eq!(structured.code, "SD030");
        assert_eq!(structured.kind, "parse");
        assert_eq!(structured.exit_code, 1);
        assert!(structured.message.contains("line 7"));
    }

    #[test]
    fn test_structured_error_through_context() {
        let err = anyhow::Error::new(DedupeError::Config("empty".into()))
            .context("failed to deduplicate in.csv");
        assert_eq!(code_for(&err), "SD060");
        let structured = StructuredError::new(&err, ExitCode::Failure);
        assert_eq!(structured.kind, "config");
        assert!(structured.message.contains("failed to deduplicate"));
    }

    #[test]
    fn test_structured_error_generic() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(code_for(&err), GENERIC_ERROR_CODE);
        let structured = StructuredError::new(&err, ExitCode::Failure);
        assert_eq!(structured.kind, "other");
    }
}
