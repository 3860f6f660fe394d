//! Configuration management for the governance gate.
//!
//! Settings come from an optional JSON or TOML document, chosen by file
//! extension. Every section falls back to built-in defaults, and a missing
//! file is not an error.

#![warn(missing_docs, clippy::pedantic)]

use std::path::PathBuf;

use gate_constitution::ConstitutionError;
use gate_parliament::ParliamentError;
use gate_verification::VerificationError;
use thiserror::Error;

pub mod loader;
pub mod schema;

pub use loader::{CONFIG_ENV, ConfigFormat, load_from_path, load_or_default, parse};
pub use schema::{GateSettings, GovernanceSettings};

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The extension is neither `.json` nor `.toml`.
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(PathBuf),
    /// Malformed JSON.
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// Malformed TOML.
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
    /// A gate setting is out of range.
    #[error("invalid gate settings: {0}")]
    Invalid(&'static str),
    /// Constitution overrides do not merge.
    #[error(transparent)]
    Constitution(#[from] ConstitutionError),
    /// Verification section rejected.
    #[error(transparent)]
    Verification(#[from] VerificationError),
    /// Parliament section rejected.
    #[error(transparent)]
    Parliament(#[from] ParliamentError),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
