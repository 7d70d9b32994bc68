//! Application configuration management.
//!
//! Settings are layered with figment, lowest to highest priority:
//!
//! 1. Built-in defaults (`utf-8` output, `shift_jis` then `cp932` input, CRLF)
//! 2. TOML config file (`--config <PATH>` or the platform config directory)
//! 3. Environment variables prefixed with `SJIS_DEDUPE_`
//! 4. Command-line flags
//!
//! # Example config file
//!
//! ```toml
//! out_encoding = "utf-8-sig"
//! input_encodings = ["cp932", "shift_jis"]
//! line_terminator = "lf"
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::decode::{LegacyEncoding, DEFAULT_CANDIDATES};
use crate::encode::{OutputEncoding, DEFAULT_OUTPUT_LABEL};
use crate::error::DedupeError;
use crate::output::{LineTerminator, WriteOptions};

/// Prefix for configuration environment variables.
pub const ENV_PREFIX: &str = "SJIS_DEDUPE_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output encoding label.
    pub out_encoding: String,
    /// Input encoding labels, tried in order.
    pub input_encodings: Vec<String>,
    /// Record terminator for the output file.
    pub line_terminator: LineTerminator,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            out_encoding: DEFAULT_OUTPUT_LABEL.to_string(),
            input_encodings: DEFAULT_CANDIDATES
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            line_terminator: LineTerminator::default(),
        }
    }
}

/// Fully validated settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Input candidates in priority order.
    pub candidates: Vec<LegacyEncoding>,
    /// How the output is written.
    pub write: WriteOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATES.to_vec(),
            write: WriteOptions::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// An explicitly given file must exist; the platform default file is
    /// optional.
    ///
    /// # Errors
    ///
    /// Returns [`DedupeError::Config`] if the file is missing (when explicit)
    /// or if any layer holds a malformed value.
    pub fn load(explicit: Option<&Path>) -> Result<Self, DedupeError> {
        match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(DedupeError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                Self::load_from_path(path)
            }
            None => match Self::default_path() {
                Some(path) => Self::load_from_path(&path),
                None => Self::extract(Self::base_figment().merge(Env::prefixed(ENV_PREFIX))),
            },
        }
    }

    /// Load configuration using `path` as the config file layer.
    ///
    /// A missing file contributes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`DedupeError::Config`] if any layer holds a malformed value.
    pub fn load_from_path(path: &Path) -> Result<Self, DedupeError> {
        log::debug!("Loading config from {}", path.display());
        let figment = Self::base_figment()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX));
        Self::extract(figment)
    }

    fn base_figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
    }

    fn extract(figment: Figment) -> Result<Self, DedupeError> {
        figment
            .extract()
            .map_err(|e| DedupeError::Config(e.to_string()))
    }

    /// Platform-specific config file location, if one can be determined.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "sjis-dedupe", "sjis-dedupe")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply command-line overrides.
    pub fn merge_cli(&mut self, cli: &Cli) {
        if let Some(label) = &cli.out_encoding {
            self.out_encoding.clone_from(label);
        }
        if !cli.in_encodings.is_empty() {
            self.input_encodings.clone_from(&cli.in_encodings);
        }
        if let Some(terminator) = cli.line_terminator {
            self.line_terminator = terminator;
        }
    }

    /// Validate labels and build the options for a pipeline run.
    ///
    /// # Errors
    ///
    /// Returns [`DedupeError::Config`] for an unknown output or input label,
    /// or an empty input list.
    pub fn resolve(&self) -> Result<PipelineOptions, DedupeError> {
        let encoding = OutputEncoding::from_label(&self.out_encoding).ok_or_else(|| {
            DedupeError::Config(format!("unknown output encoding: {}", self.out_encoding))
        })?;

        if self.input_encodings.is_empty() {
            return Err(DedupeError::Config(
                "at least one input encoding candidate is required".to_string(),
            ));
        }

        let mut candidates = Vec::with_capacity(self.input_encodings.len());
        for label in &self.input_encodings {
            let candidate = LegacyEncoding::from_label(label).ok_or_else(|| {
                DedupeError::Config(format!(
                    "unsupported input encoding: {label} (expected shift_jis or cp932)"
                ))
            })?;
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }

        Ok(PipelineOptions {
            candidates,
            write: WriteOptions {
                encoding,
                terminator: self.line_terminator,
            },
        })
    }
}
