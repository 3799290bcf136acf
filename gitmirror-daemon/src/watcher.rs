//! Local side of a mirror: turn filesystem bursts into one commit-and-push.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;

use gitmirror_git::VcsGateway;

use crate::context::MirrorContext;
use crate::debounce::Debounce;
use crate::error::DaemonError;
use crate::shutdown::Shutdown;

/// How often to look for the mirror directory before it exists, and how long
/// to wait before retrying a failed watch registration.
pub const DIR_POLL_INTERVAL: Duration = Duration::from_secs(5);

const METADATA_DIR: &str = ".git";

type EventRx = mpsc::UnboundedReceiver<notify::Result<Event>>;

/// Where a sync sequence stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    NotInitialized,
    NoChanges,
    RebaseFailed,
    StageFailed,
    CommitFailed,
    PushFailed,
    Pushed,
}

pub struct LocalWatcher {
    ctx: MirrorContext,
    gateway: Arc<dyn VcsGateway>,
}

impl LocalWatcher {
    pub fn new(ctx: MirrorContext, gateway: Arc<dyn VcsGateway>) -> Self {
        Self { ctx, gateway }
    }

    pub async fn run(self, mut shutdown: Shutdown) {
        let Some(root) = self.wait_for_directory(&mut shutdown).await else {
            tracing::info!("watcher stopped before directory appeared");
            return;
        };

        loop {
            match attach(&root) {
                Ok((_watcher, rx)) => {
                    tracing::info!(path = %root.display(), "watching");
                    self.event_loop(&root, rx, &mut shutdown).await;
                    break;
                }
                Err(err) => {
                    tracing::warn!(error = %err, path = %root.display(), "failed to watch directory; retrying");
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(DIR_POLL_INTERVAL) => {}
                    }
                }
            }
        }
        tracing::info!("watcher stopped");
    }

    /// Resolves to the canonical directory path, or `None` if stopped first.
    async fn wait_for_directory(&self, shutdown: &mut Shutdown) -> Option<PathBuf> {
        let path = self.ctx.local_path();
        let mut announced = false;
        loop {
            if shutdown.is_triggered() {
                return None;
            }
            if tokio::fs::metadata(path)
                .await
                .map(|meta| meta.is_dir())
                .unwrap_or(false)
            {
                // notify reports canonical paths on some platforms.
                let root = tokio::fs::canonicalize(path)
                    .await
                    .unwrap_or_else(|_| path.to_path_buf());
                return Some(root);
            }
            if !announced {
                tracing::info!(path = %path.display(), "waiting for mirror directory");
                announced = true;
            }
            tokio::select! {
                _ = shutdown.recv() => return None,
                _ = tokio::time::sleep(DIR_POLL_INTERVAL) => {}
            }
        }
    }

    /// Consume events until stopped, firing a sync once each burst settles.
    pub(crate) async fn event_loop(&self, root: &Path, mut rx: EventRx, shutdown: &mut Shutdown) {
        let mut debounce = Debounce::new(self.ctx.mirror.debounce);
        let mut events_open = true;

        loop {
            let deadline = debounce.deadline();
            tokio::select! {
                _ = shutdown.recv() => break,
                event = rx.recv(), if events_open => match event {
                    Some(Ok(event)) => {
                        if is_qualifying(root, &event) {
                            debounce.record(Instant::now());
                        }
                    }
                    Some(Err(err)) => tracing::warn!(error = %err, "watch error"),
                    None => {
                        tracing::warn!("event stream closed; no further local changes will be seen");
                        events_open = false;
                    }
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if debounce.take_due(Instant::now()) {
                        let outcome = self.sync_once().await;
                        tracing::debug!(?outcome, "sync finished");
                    }
                }
            }
        }
    }

    /// Commit and push whatever is pending in the working copy.
    pub async fn sync_once(&self) -> SyncOutcome {
        let _guard = self.ctx.exclusive().await;
        let path = self.ctx.local_path();
        let mirror = &self.ctx.mirror;
        let settings = &self.ctx.settings;

        if !self.gateway.is_initialized(path).await {
            tracing::debug!("working copy not initialized yet");
            return SyncOutcome::NotInitialized;
        }
        if !self.gateway.has_pending_changes(path).await {
            tracing::debug!("no local changes");
            return SyncOutcome::NoChanges;
        }

        tracing::info!("local changes settled; syncing");
        if settings.pull_before_push {
            if let Err(err) = self
                .gateway
                .pull_rebase(path, Some(&mirror.remote), self.ctx.credential())
                .await
            {
                tracing::warn!(error = %err, "pull --rebase failed; not pushing");
                return SyncOutcome::RebaseFailed;
            }
        }
        if let Err(err) = self.gateway.stage_all(path).await {
            tracing::warn!(error = %err, "staging failed");
            return SyncOutcome::StageFailed;
        }
        if let Err(err) = self
            .gateway
            .commit(path, &settings.commit_message, &settings.identity)
            .await
        {
            tracing::warn!(error = %err, "commit failed");
            return SyncOutcome::CommitFailed;
        }

        let branch = self.gateway.current_branch(path).await;
        match self
            .gateway
            .push(
                path,
                Some(branch.as_str()),
                Some(&mirror.remote),
                self.ctx.credential(),
            )
            .await
        {
            Ok(()) => {
                tracing::info!(branch = %branch, "pushed local changes");
                SyncOutcome::Pushed
            }
            Err(err) => {
                tracing::warn!(error = %err, "push failed");
                SyncOutcome::PushFailed
            }
        }
    }
}

fn attach(root: &Path) -> Result<(RecommendedWatcher, EventRx), DaemonError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut watcher = recommended_watcher(move |event| {
        let _ = tx.send(event);
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    Ok((watcher, rx))
}

/// Create/modify/remove (renames arrive as modify) touching anything outside `.git`.
pub fn is_qualifying(root: &Path, event: &Event) -> bool {
    let kind_ok = matches!(
        event.kind,
        EventKind::Any | EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    kind_ok && event.paths.iter().any(|path| !is_metadata_path(root, path))
}

pub fn is_metadata_path(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .any(|c| matches!(c, Component::Normal(name) if name == METADATA_DIR))
}
