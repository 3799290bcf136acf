//! Error types for gitmirror-git.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single git primitive.
///
/// `command` is the git subcommand only (`clone`, `push`, ...); arguments are
/// never included because they may carry an authenticated URL.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("git {command} timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("failed to run git {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit. `diagnostic` is the captured output with any credential
    /// redacted.
    #[error("git {command} exited with status {code:?}: {diagnostic}")]
    Failed {
        command: String,
        code: Option<i32>,
        diagnostic: String,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot clone into {path}: path has no final component")]
    InvalidPath { path: PathBuf },
}

/// Failure to learn the latest upstream revision. Always transient to callers.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("'{0}' is not a GitHub repository")]
    NotGitHub(String),

    #[error("branch '{branch}' not found on {remote}")]
    BranchNotFound { remote: String, branch: String },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("revision query task failed: {0}")]
    Join(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> GitError {
    GitError::Io {
        path: path.into(),
        source,
    }
}
