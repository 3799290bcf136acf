//! gitmirror core library: domain types, remote identifiers, configuration.
//!
//! Public API surface:
//! - [`types`] — mirrors, credentials, commit identity
//! - [`remote`] — parsing of `owner/repo`, HTTPS, SSH and local remotes
//! - [`config`] — load / validate / resolve
//! - [`error`] — [`ConfigError`], [`RemoteError`]

pub mod config;
pub mod error;
pub mod remote;
pub mod types;

pub use config::{Config, RawConfig, RawMirror, SkippedMirror};
pub use error::{ConfigError, RemoteError};
pub use remote::{Remote, RepoSlug, Transport};
pub use types::{
    CommitIdentity, RepositoryMirror, RevisionSourceKind, SyncCredential, SyncSettings,
};
