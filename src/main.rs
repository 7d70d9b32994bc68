//! sjis-dedupe - Shift_JIS CSV Deduplicator
//!
//! Entry point for the sjis-dedupe CLI application.

use clap::Parser;
use sjis_dedupe::{
    cli::Cli,
    error::{code_for, ExitCode, StructuredError},
    logging::init_logging,
};

fn main() {
    let cli = Cli::parse();
    let json_errors = cli.json_errors;
    init_logging(cli.verbose, cli.quiet);

    match sjis_dedupe::run_app(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            let exit_code = ExitCode::Failure;

            if json_errors {
                let structured = StructuredError::new(&err, exit_code);
                if let Ok(json) = serde_json::to_string_pretty(&structured) {
                    eprintln!("{}", json);
                } else {
                    eprintln!("[{}] Error: {}", code_for(&err), err);
                }
            } else {
                eprintln!("[{}] Error: {}", code_for(&err), err);
            }

            std::process::exit(exit_code.as_i32());
        }
    }
}
