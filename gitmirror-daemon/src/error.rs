use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon runtime.
///
/// Per-mirror failures (queries, git primitives) never surface here; they are
/// logged inside the detector and watcher loops.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("no usable mirrors configured ({skipped} skipped)")]
    NoMirrors { skipped: usize },

    #[error("signal handler failed: {0}")]
    Signal(#[source] std::io::Error),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
