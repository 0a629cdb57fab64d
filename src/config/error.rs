//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// A single reason a configuration is unusable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigViolation {
    #[error("Product catalogue is empty")]
    EmptyCatalogue,

    #[error("Product id must not be blank")]
    BlankProductId,

    #[error("Product '{product}' has a zero price")]
    ZeroPrice { product: String },

    #[error("History capacity must be at least 1")]
    ZeroHistoryCapacity,

    #[error("Fault policy lists no fatal codes; use `never` instead")]
    EmptyFatalCodes,
}

/// Errors that can occur when loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// Every violation found, not only the first.
    #[error("Invalid configuration: {}", format_violations(.0))]
    Invalid(Vec<ConfigViolation>),
}

fn format_violations(violations: &[ConfigViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
