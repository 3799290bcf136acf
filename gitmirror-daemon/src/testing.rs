//! In-memory gateway and revision source for detector/watcher tests.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use gitmirror_core::{
    CommitIdentity, Remote, RepositoryMirror, RevisionSourceKind, SyncCredential, SyncSettings,
};
use gitmirror_git::{GitError, QueryError, RevisionSource, VcsGateway};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Clone { branch: String },
    Pull,
    PullRebase,
    StageAll,
    HasPendingChanges,
    Commit { message: String },
    Push { branch: Option<String> },
    IsInitialized,
    CurrentBranch,
}

/// Records every call; `clone` flips the working copy to initialized.
#[derive(Debug, Default)]
pub struct FakeGateway {
    calls: Mutex<Vec<(Call, Instant)>>,
    initialized: AtomicBool,
    pending: AtomicBool,
    failing: Mutex<HashSet<&'static str>>,
    /// Simulated duration of each mutating primitive.
    latency: Mutex<Duration>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialized(self, value: bool) -> Self {
        self.initialized.store(value, Ordering::SeqCst);
        self
    }

    pub fn pending(self, value: bool) -> Self {
        self.pending.store(value, Ordering::SeqCst);
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock().expect("latency lock") = latency;
        self
    }

    /// Make `op` (`clone`, `pull`, `pull_rebase`, `add`, `commit`, `push`) fail.
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().expect("failing lock").insert(op);
    }

    pub fn succeed(&self, op: &'static str) {
        self.failing.lock().expect("failing lock").remove(op);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(|(call, _)| call.clone())
            .collect()
    }

    pub fn timed_calls(&self) -> Vec<(Call, Instant)> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| pred(call)).count()
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .expect("calls lock")
            .push((call, Instant::now()));
    }

    async fn outcome(&self, op: &'static str) -> Result<(), GitError> {
        let latency = *self.latency.lock().expect("latency lock");
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.failing.lock().expect("failing lock").contains(op) {
            Err(GitError::Failed {
                command: op.to_owned(),
                code: Some(1),
                diagnostic: format!("{op} failed"),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl VcsGateway for FakeGateway {
    async fn clone_repo(
        &self,
        _remote: &Remote,
        _local_path: &Path,
        _credential: Option<&SyncCredential>,
        branch: &str,
    ) -> Result<(), GitError> {
        self.record(Call::Clone {
            branch: branch.to_owned(),
        });
        self.outcome("clone").await?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn pull(
        &self,
        _local_path: &Path,
        _remote: Option<&Remote>,
        _credential: Option<&SyncCredential>,
    ) -> Result<(), GitError> {
        self.record(Call::Pull);
        self.outcome("pull").await
    }

    async fn pull_rebase(
        &self,
        _local_path: &Path,
        _remote: Option<&Remote>,
        _credential: Option<&SyncCredential>,
    ) -> Result<(), GitError> {
        self.record(Call::PullRebase);
        self.outcome("pull_rebase").await
    }

    async fn stage_all(&self, _local_path: &Path) -> Result<(), GitError> {
        self.record(Call::StageAll);
        self.outcome("add").await
    }

    async fn has_pending_changes(&self, _local_path: &Path) -> bool {
        self.record(Call::HasPendingChanges);
        self.pending.load(Ordering::SeqCst)
    }

    async fn commit(
        &self,
        _local_path: &Path,
        message: &str,
        _identity: &CommitIdentity,
    ) -> Result<(), GitError> {
        self.record(Call::Commit {
            message: message.to_owned(),
        });
        self.outcome("commit").await
    }

    async fn push(
        &self,
        _local_path: &Path,
        branch: Option<&str>,
        _remote: Option<&Remote>,
        _credential: Option<&SyncCredential>,
    ) -> Result<(), GitError> {
        self.record(Call::Push {
            branch: branch.map(str::to_owned),
        });
        self.outcome("push").await
    }

    async fn is_initialized(&self, _local_path: &Path) -> bool {
        self.record(Call::IsInitialized);
        self.initialized.load(Ordering::SeqCst)
    }

    async fn current_branch(&self, _local_path: &Path) -> String {
        self.record(Call::CurrentBranch);
        "main".to_owned()
    }
}

/// Returns scripted revisions in order; `None` entries are query failures.
/// Once the script runs out the last answer repeats.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Option<String>>>,
    last: Mutex<Option<Option<String>>>,
}

impl ScriptedSource {
    pub fn new<'a>(script: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().map(|s| s.map(str::to_owned)).collect()),
            last: Mutex::new(None),
        }
    }
}

#[async_trait]
impl RevisionSource for ScriptedSource {
    async fn latest_revision(&self, remote: &Remote, _branch: &str) -> Result<String, QueryError> {
        let next = self.script.lock().expect("script lock").pop_front();
        let answer = match next {
            Some(answer) => {
                *self.last.lock().expect("last lock") = Some(answer.clone());
                answer
            }
            None => self.last.lock().expect("last lock").clone().flatten(),
        };
        answer.ok_or_else(|| QueryError::Transport {
            url: remote.to_string(),
            message: "scripted failure".to_owned(),
        })
    }
}

pub fn mirror(path: impl Into<PathBuf>, poll: Duration, debounce: Duration) -> RepositoryMirror {
    RepositoryMirror {
        remote: Remote::parse("octo/widgets").expect("remote"),
        local_path: path.into(),
        branch: "main".to_owned(),
        poll_interval: poll,
        debounce,
    }
}

pub fn settings(pull_before_push: bool, exclusive_sync: bool) -> SyncSettings {
    SyncSettings {
        identity: CommitIdentity {
            name: "GitSync".to_owned(),
            email: "gitsync@local".to_owned(),
        },
        commit_message: "GitSync: auto sync".to_owned(),
        pull_before_push,
        exclusive_sync,
        credential: None,
        revision_source: RevisionSourceKind::Github,
        api_base_url: "https://api.github.com".to_owned(),
    }
}
