//! Latest-revision lookups for a remote branch.

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use gitmirror_core::types::redact;
use gitmirror_core::{Remote, RepoSlug, SyncCredential};

use crate::error::{GitError, QueryError};
use crate::runner;

/// Timeout for one HTTP commit lookup.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for one `git ls-remote`.
pub const LS_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Reports the revision a remote branch currently points at.
#[async_trait]
pub trait RevisionSource: Send + Sync {
    async fn latest_revision(&self, remote: &Remote, branch: &str) -> Result<String, QueryError>;
}

// ---------------------------------------------------------------------------
// GitHub REST
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
}

/// `GET {base}/repos/{owner}/{repo}/commits/{branch}`.
#[derive(Debug, Clone)]
pub struct GitHubApi {
    base_url: String,
    credential: Option<SyncCredential>,
    agent: ureq::Agent,
}

impl GitHubApi {
    pub fn new(base_url: impl Into<String>, credential: Option<SyncCredential>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(QUERY_TIMEOUT)
            .user_agent(concat!("gitmirror/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            credential,
            agent,
        }
    }

    pub fn commit_url(&self, slug: &RepoSlug, branch: &str) -> String {
        format!(
            "{}/repos/{}/{}/commits/{}",
            self.base_url, slug.owner, slug.name, branch
        )
    }
}

#[async_trait]
impl RevisionSource for GitHubApi {
    async fn latest_revision(&self, remote: &Remote, branch: &str) -> Result<String, QueryError> {
        let slug = remote
            .slug()
            .ok_or_else(|| QueryError::NotGitHub(remote.to_string()))?;
        let url = self.commit_url(slug, branch);
        let agent = self.agent.clone();
        let authorization = self
            .credential
            .as_ref()
            .map(|c| format!("Bearer {}", c.expose()));

        tokio::task::spawn_blocking(move || fetch_sha(&agent, &url, authorization.as_deref()))
            .await
            .map_err(|err| QueryError::Join(err.to_string()))?
    }
}

fn fetch_sha(
    agent: &ureq::Agent,
    url: &str,
    authorization: Option<&str>,
) -> Result<String, QueryError> {
    let mut request = agent
        .get(url)
        .set("Accept", "application/vnd.github.v3+json");
    if let Some(authorization) = authorization {
        request = request.set("Authorization", authorization);
    }

    let response = match request.call() {
        Ok(response) => response,
        Err(ureq::Error::Status(status, _)) => {
            return Err(QueryError::Status {
                url: url.to_owned(),
                status,
            })
        }
        Err(err) => {
            return Err(QueryError::Transport {
                url: url.to_owned(),
                message: err.to_string(),
            })
        }
    };

    let body: CommitResponse = response.into_json().map_err(|err| QueryError::Decode {
        url: url.to_owned(),
        message: err.to_string(),
    })?;
    if body.sha.trim().is_empty() {
        return Err(QueryError::Decode {
            url: url.to_owned(),
            message: "empty sha".to_owned(),
        });
    }
    Ok(body.sha)
}

// ---------------------------------------------------------------------------
// git ls-remote
// ---------------------------------------------------------------------------

/// `git ls-remote <url> refs/heads/<branch>`; works for any remote git reaches.
#[derive(Debug, Clone)]
pub struct LsRemote {
    program: OsString,
    credential: Option<SyncCredential>,
    timeout: Duration,
}

impl LsRemote {
    pub fn new(credential: Option<SyncCredential>) -> Self {
        Self {
            program: OsString::from("git"),
            credential,
            timeout: LS_REMOTE_TIMEOUT,
        }
    }

    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl RevisionSource for LsRemote {
    async fn latest_revision(&self, remote: &Remote, branch: &str) -> Result<String, QueryError> {
        let url = remote.authenticated_url(self.credential.as_ref());
        let refname = format!("refs/heads/{branch}");
        let output = runner::run(
            &self.program,
            Path::new("."),
            &["ls-remote", url.as_str(), refname.as_str()],
            &[],
            self.timeout,
        )
        .await?;

        if !output.success() {
            return Err(QueryError::Git(GitError::Failed {
                command: "ls-remote".to_owned(),
                code: output.code,
                diagnostic: redact(self.credential.as_ref(), output.diagnostic()),
            }));
        }

        parse_ls_remote(&output.stdout, &refname).ok_or_else(|| QueryError::BranchNotFound {
            remote: remote.to_string(),
            branch: branch.to_owned(),
        })
    }
}

/// Revision of `refname` in `ls-remote` output (`<sha>\t<ref>` per line).
fn parse_ls_remote(stdout: &str, refname: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let sha = fields.next()?;
        (fields.next()? == refname).then(|| sha.to_owned())
    })
}
