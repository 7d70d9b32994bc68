//! Command-line interface definitions for sjis-dedupe.
//!
//! # Example
//!
//! ```bash
//! # Deduplicate a Shift_JIS CSV into UTF-8
//! sjis-dedupe input.csv output.csv
//!
//! # Keep the output in CP932
//! sjis-dedupe input.csv output.csv --out-encoding cp932
//!
//! # Prefer the CP932 interpretation of ambiguous symbols
//! sjis-dedupe input.csv output.csv --in-encoding cp932 --in-encoding shift_jis
//! ```

use clap::Parser;
use std::path::PathBuf;

use crate::output::LineTerminator;

/// Remove duplicate rows from a Shift_JIS / CP932 encoded CSV, preserving order.
///
/// The input is decoded as Shift_JIS, falling back to CP932. The first
/// occurrence of every row is kept and the result is written in the output
/// encoding (UTF-8 unless configured otherwise).
#[derive(Debug, Parser)]
#[command(name = "sjis-dedupe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input CSV path (Shift_JIS / CP932 encoded)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output CSV path (overwritten if it exists)
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Output encoding (default: utf-8)
    ///
    /// Accepts utf-8, utf-8-sig, utf-16, utf-16le, utf-16be, shift_jis
    /// (JIS X 0208 only), cp932 and any other WHATWG encoding label such as
    /// euc-jp.
    #[arg(long, value_name = "ENCODING")]
    pub out_encoding: Option<String>,

    /// Input encoding candidate, tried in the order given (default: shift_jis, cp932)
    #[arg(long = "in-encoding", value_name = "ENCODING")]
    pub in_encodings: Vec<String>,

    /// Record terminator for the output file (default: crlf)
    #[arg(long, value_enum, value_name = "TERMINATOR")]
    pub line_terminator: Option<LineTerminator>,

    /// Path to a TOML config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print errors as JSON objects on stderr
    #[arg(long)]
    pub json_errors: bool,
}
