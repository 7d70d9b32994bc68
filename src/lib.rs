//! sjis-dedupe - Shift_JIS CSV Deduplicator
//!
//! Removes duplicate rows from CSV files written in Shift_JIS or CP932,
//! keeping the first occurrence of each row in input order, and re-encodes
//! the result (UTF-8 by default).
//!
//! The work happens in three stages: [`decode`] tries the legacy encodings
//! in order, [`dedupe`] parses and filters rows, and [`output`] serializes
//! and atomically writes them through an [`encode::OutputEncoding`].

pub mod cli;
pub mod config;
pub mod decode;
pub mod dedupe;
pub mod encode;
pub mod error;
pub mod logging;
pub mod output;
pub mod pipeline;

use anyhow::Result;

use crate::cli::Cli;
use crate::config::Config;
use crate::error::ExitCode;

/// Run the application for parsed command-line arguments.
///
/// Prints the confirmation line on success.
///
/// # Errors
///
/// Returns an error if configuration is invalid or any pipeline stage fails.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.merge_cli(&cli);
    let options = config.resolve()?;
    log::debug!("Resolved options: {:?}", options);

    let report = pipeline::run(&cli.input, &cli.output, &options)?;
    log::info!(
        "{} -> {}: {} bytes read, {} bytes written",
        report.input_encoding,
        report.output_encoding,
        report.bytes_read,
        report.bytes_written
    );

    println!(
        "Done. Deduplicated file written to: {}",
        cli.output.display()
    );
    Ok(ExitCode::Success)
}
