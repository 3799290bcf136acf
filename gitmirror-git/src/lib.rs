//! # gitmirror-git
//!
//! Version-control primitives against a local working copy, and lookups of the
//! latest upstream revision.
//!
//! [`GitCli`] implements [`VcsGateway`] by running the `git` executable with a
//! hard timeout per call. [`GitHubApi`] and [`LsRemote`] implement
//! [`RevisionSource`].

pub mod error;
pub mod gateway;
pub mod revision;
pub mod runner;

pub use error::{GitError, QueryError};
pub use gateway::{GitCli, VcsGateway};
pub use revision::{GitHubApi, LsRemote, RevisionSource};
pub use runner::{GitOutput, GIT_TIMEOUT};
