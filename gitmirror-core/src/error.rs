//! Error types for gitmirror-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that make the configuration unusable as a whole.
///
/// Problems confined to a single mirror entry are not errors; they are
/// reported through [`crate::SkippedMirror`] instead.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    /// Underlying I/O failure while reading the file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Malformed YAML.
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `repos` is absent or empty.
    #[error("config must have a non-empty 'repos' array")]
    NoRepositories,

    /// A global setting holds a value that cannot be used.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Errors from [`crate::Remote::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("remote identifier is empty")]
    Empty,

    #[error("unrecognised remote '{0}'; expected owner/repo, an https:// or ssh URL, or a local path")]
    Unrecognised(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
