//! Starts the detector and watcher for every mirror and owns the stop signal.

use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::Instrument;

use gitmirror_core::{RepositoryMirror, SyncSettings};
use gitmirror_git::{RevisionSource, VcsGateway};

use crate::context::MirrorContext;
use crate::detector::RemoteDetector;
use crate::shutdown::Shutdown;
use crate::watcher::LocalWatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Detector,
    Watcher,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Detector => f.write_str("detector"),
            Role::Watcher => f.write_str("watcher"),
        }
    }
}

struct MirrorTask {
    label: String,
    role: Role,
    handle: JoinHandle<()>,
}

/// Two tasks per mirror, all listening to one broadcast stop signal.
pub struct Coordinator {
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<MirrorTask>,
}

impl Coordinator {
    /// Spawn every task on the current runtime.
    pub fn start(
        settings: &SyncSettings,
        mirrors: &[RepositoryMirror],
        gateway: Arc<dyn VcsGateway>,
        source: Arc<dyn RevisionSource>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel::<()>(16);
        let settings = Arc::new(settings.clone());
        let mut tasks = Vec::with_capacity(mirrors.len() * 2);

        for mirror in mirrors {
            let label = format!("{} -> {}", mirror.remote, mirror.local_path.display());
            let span = tracing::info_span!(
                "mirror",
                remote = %mirror.remote,
                path = %mirror.local_path.display()
            );
            let ctx = MirrorContext::new(mirror.clone(), settings.clone());

            let detector = RemoteDetector::new(ctx.clone(), gateway.clone(), source.clone());
            let handle = tokio::spawn(
                detector
                    .run(Shutdown::new(shutdown_tx.subscribe()))
                    .instrument(span.clone()),
            );
            tasks.push(MirrorTask {
                label: label.clone(),
                role: Role::Detector,
                handle,
            });

            let watcher = LocalWatcher::new(ctx, gateway.clone());
            let handle = tokio::spawn(
                watcher
                    .run(Shutdown::new(shutdown_tx.subscribe()))
                    .instrument(span),
            );
            tasks.push(MirrorTask {
                label,
                role: Role::Watcher,
                handle,
            });
        }

        tracing::info!(mirrors = mirrors.len(), tasks = tasks.len(), "mirror tasks started");
        Self { shutdown_tx, tasks }
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Broadcast the stop signal. Tasks finish their current step first.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Receiver that observes [`Coordinator::stop`].
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Wait for every task to exit. A task that panicked is logged, not re-raised.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(err) = task.handle.await {
                tracing::error!(
                    mirror = %task.label,
                    role = %task.role,
                    error = %err,
                    "mirror task ended abnormally"
                );
            }
        }
        tracing::info!("all mirror tasks stopped");
    }
}
