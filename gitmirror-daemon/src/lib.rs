//! gitmirror daemon: per-mirror remote detector + local watcher, coordinated
//! under one shutdown signal.

pub mod context;
pub mod coordinator;
pub mod debounce;
pub mod detector;
mod error;
pub mod runtime;
pub mod shutdown;
pub mod watcher;

#[cfg(test)]
mod testing;

pub use context::MirrorContext;
pub use coordinator::Coordinator;
pub use detector::{PollOutcome, PollState, RemoteDetector};
pub use error::DaemonError;
pub use runtime::{init_tracing, run, start_blocking, LogFormat};
pub use shutdown::Shutdown;
pub use watcher::{LocalWatcher, SyncOutcome};
