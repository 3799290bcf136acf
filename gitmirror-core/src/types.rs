//! Domain types for mirrored repositories.
//!
//! All path fields use `PathBuf`. Everything here is immutable once the
//! configuration has been resolved and is shared read-only across tasks.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::remote::Remote;

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// Process-wide authentication token injected into every remote-touching call.
///
/// `Debug` never prints the token; use [`SyncCredential::redact`] on any text
/// that may have echoed it back (git diagnostics, URLs).
#[derive(Clone, PartialEq, Eq)]
pub struct SyncCredential(String);

impl SyncCredential {
    /// Returns `None` for blank tokens so that an empty environment variable
    /// counts as unset.
    pub fn new(token: impl AsRef<str>) -> Option<Self> {
        let token = token.as_ref().trim();
        if token.is_empty() {
            None
        } else {
            Some(Self(token.to_owned()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Replace every occurrence of the token in `text` with `***`.
    pub fn redact(&self, text: &str) -> String {
        text.replace(&self.0, "***")
    }
}

impl fmt::Debug for SyncCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SyncCredential(***)")
    }
}

/// [`SyncCredential::redact`] for an optional credential.
pub fn redact(credential: Option<&SyncCredential>, text: &str) -> String {
    match credential {
        Some(credential) => credential.redact(text),
        None => text.to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Where the detector learns the latest upstream revision from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RevisionSourceKind {
    /// GitHub REST commit lookup.
    #[default]
    Github,
    /// `git ls-remote` against the clone URL.
    LsRemote,
}

impl fmt::Display for RevisionSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionSourceKind::Github => write!(f, "github"),
            RevisionSourceKind::LsRemote => write!(f, "ls-remote"),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// Author and committer identity for synthetic commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

/// One remote repository mirrored into one local directory.
///
/// Drives exactly one detector and one watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryMirror {
    pub remote: Remote,
    /// Working copy root on disk.
    pub local_path: PathBuf,
    pub branch: String,
    pub poll_interval: Duration,
    pub debounce: Duration,
}

/// Settings shared by every mirror.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub identity: CommitIdentity,
    pub commit_message: String,
    pub pull_before_push: bool,
    /// Serialize detector pulls and watcher sync sequences per mirror.
    pub exclusive_sync: bool,
    pub credential: Option<SyncCredential>,
    pub revision_source: RevisionSourceKind,
    pub api_base_url: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_credential_is_none() {
        assert!(SyncCredential::new("").is_none());
        assert!(SyncCredential::new("   ").is_none());
        assert_eq!(
            SyncCredential::new(" ghp_abc ").map(|c| c.expose().to_owned()),
            Some("ghp_abc".to_owned())
        );
    }

    #[test]
    fn credential_debug_and_redact_hide_token() {
        let credential = SyncCredential::new("ghp_secret").expect("token");
        assert_eq!(format!("{credential:?}"), "SyncCredential(***)");
        assert_eq!(
            credential.redact("fatal: https://ghp_secret@github.com/o/r.git"),
            "fatal: https://***@github.com/o/r.git"
        );
        assert_eq!(redact(None, "plain"), "plain");
    }

    #[test]
    fn revision_source_kind_serde_names() {
        let kind: RevisionSourceKind = serde_json::from_str("\"ls-remote\"").expect("parse");
        assert_eq!(kind, RevisionSourceKind::LsRemote);
        assert_eq!(RevisionSourceKind::default().to_string(), "github");
    }
}
