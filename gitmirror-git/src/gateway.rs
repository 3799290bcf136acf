//! VCS gateway: the git primitives the detector and watcher are built from.
//!
//! Every fallible primitive logs its diagnostic and returns `Err`; nothing
//! here panics or retries. Callers decide whether to skip or abort a cycle.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use gitmirror_core::types::redact;
use gitmirror_core::{CommitIdentity, Remote, SyncCredential, Transport};

use crate::error::{io_err, GitError};
use crate::runner::{self, GitOutput, GIT_TIMEOUT};

/// Branch reported when `HEAD` cannot be resolved to a branch name.
pub const FALLBACK_BRANCH: &str = "main";

/// Version-control operations on one working copy.
#[async_trait]
pub trait VcsGateway: Send + Sync {
    /// Clone `remote` into `local_path`, creating parent directories.
    ///
    /// Falls back to the remote's default branch when `branch` does not exist
    /// upstream.
    async fn clone_repo(
        &self,
        remote: &Remote,
        local_path: &Path,
        credential: Option<&SyncCredential>,
        branch: &str,
    ) -> Result<(), GitError>;

    /// `git pull`. With both `remote` and `credential`, the stored origin URL is
    /// refreshed first so a rotated token takes effect without re-cloning.
    async fn pull(
        &self,
        local_path: &Path,
        remote: Option<&Remote>,
        credential: Option<&SyncCredential>,
    ) -> Result<(), GitError>;

    /// `git pull --rebase --autostash`, with the same origin refresh as
    /// [`VcsGateway::pull`]. Uncommitted edits are stashed around the rebase;
    /// a stash that cannot be re-applied cleanly is an error.
    async fn pull_rebase(
        &self,
        local_path: &Path,
        remote: Option<&Remote>,
        credential: Option<&SyncCredential>,
    ) -> Result<(), GitError>;

    async fn stage_all(&self, local_path: &Path) -> Result<(), GitError>;

    /// Staged or unstaged changes exist. A failed status check counts as `false`.
    async fn has_pending_changes(&self, local_path: &Path) -> bool;

    /// Commit staged changes. "Nothing to commit" is success.
    async fn commit(
        &self,
        local_path: &Path,
        message: &str,
        identity: &CommitIdentity,
    ) -> Result<(), GitError>;

    async fn push(
        &self,
        local_path: &Path,
        branch: Option<&str>,
        remote: Option<&Remote>,
        credential: Option<&SyncCredential>,
    ) -> Result<(), GitError>;

    /// `local_path` holds a `.git` directory.
    async fn is_initialized(&self, local_path: &Path) -> bool;

    /// Checked-out branch, or [`FALLBACK_BRANCH`].
    async fn current_branch(&self, local_path: &Path) -> String;
}

// ---------------------------------------------------------------------------
// GitCli
// ---------------------------------------------------------------------------

/// [`VcsGateway`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: OsString,
    timeout: Duration,
    /// Committer for operations that rewrite history (`pull --rebase`).
    committer: Option<CommitIdentity>,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: OsString::from("git"),
            timeout: GIT_TIMEOUT,
            committer: None,
        }
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Supply an author and committer identity to every invocation, so that a
    /// rebase or autostash works on hosts without a global git identity.
    pub fn with_committer(mut self, identity: CommitIdentity) -> Self {
        self.committer = Some(identity);
        self
    }

    pub fn program(&self) -> &std::ffi::OsStr {
        &self.program
    }

    async fn exec(
        &self,
        cwd: &Path,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> Result<GitOutput, GitError> {
        let mut full_env: Vec<(&str, &str)> = Vec::with_capacity(env.len() + 4);
        if let Some(committer) = &self.committer {
            full_env.push(("GIT_AUTHOR_NAME", committer.name.as_str()));
            full_env.push(("GIT_AUTHOR_EMAIL", committer.email.as_str()));
            full_env.push(("GIT_COMMITTER_NAME", committer.name.as_str()));
            full_env.push(("GIT_COMMITTER_EMAIL", committer.email.as_str()));
        }
        full_env.extend_from_slice(env);
        runner::run(&self.program, cwd, args, &full_env, self.timeout).await
    }

    /// `exec`, mapping a non-zero exit into [`GitError::Failed`].
    async fn exec_checked(
        &self,
        cwd: &Path,
        args: &[&str],
        env: &[(&str, &str)],
        credential: Option<&SyncCredential>,
    ) -> Result<GitOutput, GitError> {
        let output = self.exec(cwd, args, env).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(failed(args, &output, credential))
        }
    }

    async fn refresh_origin(
        &self,
        local_path: &Path,
        remote: Option<&Remote>,
        credential: Option<&SyncCredential>,
    ) {
        let (Some(remote), Some(credential)) = (remote, credential) else {
            return;
        };
        warn_if_token_unused(remote);
        let url = remote.authenticated_url(Some(credential));
        if let Err(err) = self
            .exec_checked(
                local_path,
                &["remote", "set-url", "origin", url.as_str()],
                &[],
                Some(credential),
            )
            .await
        {
            tracing::warn!(
                path = %local_path.display(),
                error = %err,
                "could not refresh origin URL"
            );
        }
    }

    async fn pull_with(
        &self,
        local_path: &Path,
        args: &[&str],
        remote: Option<&Remote>,
        credential: Option<&SyncCredential>,
    ) -> Result<(), GitError> {
        self.refresh_origin(local_path, remote, credential).await;
        self.exec_checked(local_path, args, &[], credential)
            .await
            .map(|_| ())
            .map_err(|err| logged(args[0], local_path, err))
    }
}

#[async_trait]
impl VcsGateway for GitCli {
    async fn clone_repo(
        &self,
        remote: &Remote,
        local_path: &Path,
        credential: Option<&SyncCredential>,
        branch: &str,
    ) -> Result<(), GitError> {
        let (parent, target) =
            split_clone_target(local_path).map_err(|err| logged("clone", local_path, err))?;
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| logged("clone", local_path, io_err(&parent, e)))?;

        if credential.is_some() {
            warn_if_token_unused(remote);
        }
        let url = remote.authenticated_url(credential);

        let args = [
            "clone",
            "--depth",
            "1",
            "-b",
            branch,
            url.as_str(),
            target.as_str(),
        ];
        let output = self
            .exec(&parent, &args, &[])
            .await
            .map_err(|err| logged("clone", local_path, err))?;
        if output.success() {
            return Ok(());
        }

        if is_missing_branch(&output.stderr) {
            tracing::info!(
                remote = %remote,
                branch,
                "branch not found upstream, cloning default branch"
            );
            let fallback = ["clone", "--depth", "1", url.as_str(), target.as_str()];
            return self
                .exec_checked(&parent, &fallback, &[], credential)
                .await
                .map(|_| ())
                .map_err(|err| logged("clone", local_path, err));
        }

        Err(logged(
            "clone",
            local_path,
            failed(&["clone"], &output, credential),
        ))
    }

    async fn pull(
        &self,
        local_path: &Path,
        remote: Option<&Remote>,
        credential: Option<&SyncCredential>,
    ) -> Result<(), GitError> {
        self.pull_with(local_path, &["pull"], remote, credential)
            .await
    }

    async fn pull_rebase(
        &self,
        local_path: &Path,
        remote: Option<&Remote>,
        credential: Option<&SyncCredential>,
    ) -> Result<(), GitError> {
        const ARGS: [&str; 3] = ["pull", "--rebase", "--autostash"];
        self.refresh_origin(local_path, remote, credential).await;
        let output = self
            .exec_checked(local_path, &ARGS, &[], credential)
            .await
            .map_err(|err| logged("pull", local_path, err))?;

        // A conflicting autostash still exits 0 and leaves markers in the tree.
        let status = self
            .exec_checked(local_path, &["status", "--porcelain"], &[], None)
            .await
            .map_err(|err| logged("pull", local_path, err))?;
        if autostash_conflicted(&output) || has_unmerged_entries(&status.stdout) {
            return Err(logged(
                "pull",
                local_path,
                GitError::Failed {
                    command: "pull".to_owned(),
                    code: output.code,
                    diagnostic: AUTOSTASH_CONFLICT.to_owned(),
                },
            ));
        }
        Ok(())
    }

    async fn stage_all(&self, local_path: &Path) -> Result<(), GitError> {
        self.exec_checked(local_path, &["add", "-A"], &[], None)
            .await
            .map(|_| ())
            .map_err(|err| logged("add", local_path, err))
    }

    async fn has_pending_changes(&self, local_path: &Path) -> bool {
        match self
            .exec_checked(local_path, &["status", "--porcelain"], &[], None)
            .await
        {
            Ok(output) => !output.stdout.trim().is_empty(),
            Err(err) => {
                tracing::warn!(path = %local_path.display(), error = %err, "git status failed");
                false
            }
        }
    }

    async fn commit(
        &self,
        local_path: &Path,
        message: &str,
        identity: &CommitIdentity,
    ) -> Result<(), GitError> {
        let env = [
            ("GIT_AUTHOR_NAME", identity.name.as_str()),
            ("GIT_AUTHOR_EMAIL", identity.email.as_str()),
            ("GIT_COMMITTER_NAME", identity.name.as_str()),
            ("GIT_COMMITTER_EMAIL", identity.email.as_str()),
        ];
        let output = self
            .exec(local_path, &["commit", "-m", message], &env)
            .await
            .map_err(|err| logged("commit", local_path, err))?;

        if output.success() || is_nothing_to_commit(&output) {
            return Ok(());
        }
        Err(logged(
            "commit",
            local_path,
            failed(&["commit"], &output, None),
        ))
    }

    async fn push(
        &self,
        local_path: &Path,
        branch: Option<&str>,
        remote: Option<&Remote>,
        credential: Option<&SyncCredential>,
    ) -> Result<(), GitError> {
        self.refresh_origin(local_path, remote, credential).await;
        let mut args = vec!["push"];
        if let Some(branch) = branch {
            args.extend(["origin", branch]);
        }
        self.exec_checked(local_path, &args, &[], credential)
            .await
            .map(|_| ())
            .map_err(|err| logged("push", local_path, err))
    }

    async fn is_initialized(&self, local_path: &Path) -> bool {
        tokio::fs::metadata(local_path.join(".git"))
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    async fn current_branch(&self, local_path: &Path) -> String {
        match self
            .exec_checked(local_path, &["rev-parse", "--abbrev-ref", "HEAD"], &[], None)
            .await
        {
            Ok(output) => {
                let name = output.stdout.trim();
                if name.is_empty() || name == "HEAD" {
                    FALLBACK_BRANCH.to_owned()
                } else {
                    name.to_owned()
                }
            }
            Err(err) => {
                tracing::debug!(path = %local_path.display(), error = %err, "rev-parse failed");
                FALLBACK_BRANCH.to_owned()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn failed(args: &[&str], output: &GitOutput, credential: Option<&SyncCredential>) -> GitError {
    GitError::Failed {
        command: args.first().copied().unwrap_or_default().to_owned(),
        code: output.code,
        diagnostic: redact(credential, output.diagnostic()),
    }
}

fn logged(op: &str, path: &Path, err: GitError) -> GitError {
    tracing::error!(op, path = %path.display(), error = %err, "git operation failed");
    err
}

fn warn_if_token_unused(remote: &Remote) {
    if remote.transport() == Transport::Ssh {
        tracing::warn!(
            remote = %remote,
            "SSH remotes do not use the token; relying on SSH keys"
        );
    }
}

/// Split `local_path` into the directory git runs in and the name it clones to.
fn split_clone_target(local_path: &Path) -> Result<(PathBuf, String), GitError> {
    let name = local_path
        .file_name()
        .ok_or_else(|| GitError::InvalidPath {
            path: local_path.to_path_buf(),
        })?
        .to_string_lossy()
        .into_owned();
    let parent = match local_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((parent, name))
}

/// Clone stderr says the requested branch does not exist upstream.
pub(crate) fn is_missing_branch(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("not found") || lower.contains("couldn't find")
}

/// git reports an empty commit on stdout, older versions on stderr.
pub(crate) fn is_nothing_to_commit(output: &GitOutput) -> bool {
    output.stdout.contains("nothing to commit")
        || output.stderr.contains("nothing to commit")
        || output.stdout.contains("nothing added to commit")
}

const AUTOSTASH_CONFLICT: &str =
    "local changes conflict with upstream; resolve the working copy by hand";

/// `pull --autostash` could not cleanly re-apply local edits.
pub(crate) fn autostash_conflicted(output: &GitOutput) -> bool {
    output.stdout.contains("resulted in conflicts") || output.stderr.contains("resulted in conflicts")
}

/// Porcelain v1 lines whose XY code marks an unmerged path.
pub(crate) fn has_unmerged_entries(porcelain: &str) -> bool {
    porcelain.lines().any(|line| {
        matches!(
            line.get(..2),
            Some("DD" | "AU" | "UD" | "UA" | "DU" | "AA" | "UU")
        )
    })
}
