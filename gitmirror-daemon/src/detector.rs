//! Remote side of a mirror: poll the upstream revision, clone or pull on change.

use std::sync::Arc;

use gitmirror_git::{RevisionSource, VcsGateway};

use crate::context::MirrorContext;
use crate::shutdown::Shutdown;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// No revision adopted yet.
    Uninitialized,
    Tracking { last_seen: String },
}

impl PollState {
    pub fn last_seen(&self) -> Option<&str> {
        match self {
            PollState::Uninitialized => None,
            PollState::Tracking { last_seen } => Some(last_seen),
        }
    }
}

/// What a single poll iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    QueryFailed,
    Cloned,
    CloneFailed,
    /// A working copy already existed; its upstream revision was adopted as-is.
    Adopted,
    Pulled,
    PullFailed,
    Unchanged,
}

pub struct RemoteDetector {
    ctx: MirrorContext,
    gateway: Arc<dyn VcsGateway>,
    source: Arc<dyn RevisionSource>,
    state: PollState,
}

impl RemoteDetector {
    pub fn new(
        ctx: MirrorContext,
        gateway: Arc<dyn VcsGateway>,
        source: Arc<dyn RevisionSource>,
    ) -> Self {
        Self {
            ctx,
            gateway,
            source,
            state: PollState::Uninitialized,
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    /// One iteration. Never fails; every failure leaves the state as it was so
    /// the next interval retries.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let mirror = &self.ctx.mirror;
        let latest = match self
            .source
            .latest_revision(&mirror.remote, &mirror.branch)
            .await
        {
            Ok(rev) => rev,
            Err(err) => {
                tracing::warn!(error = %err, "revision query failed; skipping this interval");
                return PollOutcome::QueryFailed;
            }
        };

        let _guard = self.ctx.exclusive().await;
        let path = self.ctx.local_path();

        if !self.gateway.is_initialized(path).await {
            tracing::info!(path = %path.display(), branch = %mirror.branch, "cloning");
            return match self
                .gateway
                .clone_repo(&mirror.remote, path, self.ctx.credential(), &mirror.branch)
                .await
            {
                Ok(()) => {
                    tracing::info!(revision = %latest, "clone complete");
                    self.state = PollState::Tracking { last_seen: latest };
                    PollOutcome::Cloned
                }
                Err(err) => {
                    tracing::warn!(error = %err, "clone failed; will retry");
                    PollOutcome::CloneFailed
                }
            };
        }

        match &self.state {
            PollState::Uninitialized => {
                tracing::info!(revision = %latest, "tracking existing working copy");
                self.state = PollState::Tracking { last_seen: latest };
                PollOutcome::Adopted
            }
            PollState::Tracking { last_seen } if *last_seen == latest => PollOutcome::Unchanged,
            PollState::Tracking { last_seen } => {
                tracing::info!(from = %last_seen, to = %latest, "upstream changed; pulling");
                match self
                    .gateway
                    .pull(path, Some(&mirror.remote), self.ctx.credential())
                    .await
                {
                    Ok(()) => {
                        self.state = PollState::Tracking { last_seen: latest };
                        PollOutcome::Pulled
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "pull failed; will retry");
                        PollOutcome::PullFailed
                    }
                }
            }
        }
    }

    /// Poll immediately, then once per interval until stopped.
    pub async fn run(mut self, mut shutdown: Shutdown) {
        let interval = self.ctx.mirror.poll_interval;
        tracing::info!(interval_secs = interval.as_secs(), "detector started");
        loop {
            if shutdown.is_triggered() {
                break;
            }
            let outcome = self.poll_once().await;
            tracing::debug!(?outcome, "poll finished");

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        tracing::info!("detector stopped");
    }
}
