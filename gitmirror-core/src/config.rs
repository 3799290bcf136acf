//! Configuration loading and validation.
//!
//! # File format
//!
//! ```json
//! {
//!   "repos": [
//!     { "repo": "octo/widgets", "local_path": "/data/widgets", "branch": "main" }
//!   ],
//!   "poll_interval_seconds": 60,
//!   "debounce_seconds": 30,
//!   "pull_before_push": true
//! }
//! ```
//!
//! YAML with the same keys is accepted when the file ends in `.yaml`/`.yml`.
//!
//! # API pattern
//!
//! - `load_at(path, token_override)` — explicit token override; used in tests
//! - `load(path)` — reads the override from `GITHUB_TOKEN`, delegates to `load_at`
//!
//! Fatal problems return [`ConfigError`]. A broken mirror entry only removes
//! that entry and is reported in [`Config::skipped`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::remote::Remote;
use crate::types::{
    CommitIdentity, RepositoryMirror, RevisionSourceKind, SyncCredential, SyncSettings,
};

pub const DEFAULT_CONFIG_PATH: &str = "/config/config.json";
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_DEBOUNCE_SECS: u64 = 30;
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_USER_NAME: &str = "GitSync";
pub const DEFAULT_USER_EMAIL: &str = "gitsync@local";
pub const DEFAULT_COMMIT_MESSAGE: &str = "GitSync: auto sync";
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

// ---------------------------------------------------------------------------
// 1. Raw (on-disk) shape
// ---------------------------------------------------------------------------

/// Configuration exactly as written on disk. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub repos: Vec<RawMirror>,
    pub poll_interval_seconds: Option<u64>,
    pub debounce_seconds: Option<u64>,
    pub git_user_name: Option<String>,
    pub git_user_email: Option<String>,
    pub pull_before_push: Option<bool>,
    pub github_token: Option<String>,
    pub commit_message: Option<String>,
    pub api_base_url: Option<String>,
    pub revision_source: Option<RevisionSourceKind>,
    pub exclusive_sync: Option<bool>,
}

/// One entry of `repos`. Every field is optional here so that a broken entry
/// can be skipped instead of failing the whole file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMirror {
    pub repo: Option<String>,
    pub local_path: Option<PathBuf>,
    pub branch: Option<String>,
    pub poll_interval_seconds: Option<u64>,
    pub debounce_seconds: Option<u64>,
}

/// On-disk syntax, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// `.yaml` / `.yml` → YAML, anything else → JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Json,
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Resolved shape
// ---------------------------------------------------------------------------

/// A mirror entry that was dropped during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMirror {
    /// Position in the `repos` array.
    pub index: usize,
    /// The `repo` value, if there was one.
    pub repo: Option<String>,
    pub reason: String,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: SyncSettings,
    pub mirrors: Vec<RepositoryMirror>,
    pub skipped: Vec<SkippedMirror>,
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Load and resolve the file at `path`; `token_override` wins over
/// `github_token` when it is non-blank.
pub fn load_at(path: &Path, token_override: Option<String>) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let raw = parse(&contents, ConfigFormat::from_path(path), path)?;
    resolve(raw, token_override)
}

/// `load_at` with the override taken from the `GITHUB_TOKEN` environment variable.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    load_at(path, std::env::var(TOKEN_ENV).ok())
}

/// Parse `contents` without validating it. `origin` is only used in errors.
pub fn parse(contents: &str, format: ConfigFormat, origin: &Path) -> Result<RawConfig, ConfigError> {
    match format {
        ConfigFormat::Json => serde_json::from_str(contents).map_err(|source| ConfigError::Json {
            path: origin.to_path_buf(),
            source,
        }),
        ConfigFormat::Yaml => serde_yaml::from_str(contents).map_err(|source| ConfigError::Yaml {
            path: origin.to_path_buf(),
            source,
        }),
    }
}

// ---------------------------------------------------------------------------
// 4. Resolve
// ---------------------------------------------------------------------------

/// Apply defaults and validate.
pub fn resolve(raw: RawConfig, token_override: Option<String>) -> Result<Config, ConfigError> {
    if raw.repos.is_empty() {
        return Err(ConfigError::NoRepositories);
    }

    let poll_default = non_zero_global(
        "poll_interval_seconds",
        raw.poll_interval_seconds.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
    )?;
    let debounce_default = non_zero_global(
        "debounce_seconds",
        raw.debounce_seconds.unwrap_or(DEFAULT_DEBOUNCE_SECS),
    )?;

    let credential = token_override
        .as_deref()
        .and_then(SyncCredential::new)
        .or_else(|| raw.github_token.as_deref().and_then(SyncCredential::new));

    let api_base_url = non_blank(raw.api_base_url)
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned())
        .trim_end_matches('/')
        .to_owned();

    let settings = SyncSettings {
        identity: CommitIdentity {
            name: non_blank(raw.git_user_name).unwrap_or_else(|| DEFAULT_USER_NAME.to_owned()),
            email: non_blank(raw.git_user_email).unwrap_or_else(|| DEFAULT_USER_EMAIL.to_owned()),
        },
        commit_message: non_blank(raw.commit_message)
            .unwrap_or_else(|| DEFAULT_COMMIT_MESSAGE.to_owned()),
        pull_before_push: raw.pull_before_push.unwrap_or(true),
        exclusive_sync: raw.exclusive_sync.unwrap_or(false),
        credential,
        revision_source: raw.revision_source.unwrap_or_default(),
        api_base_url,
    };

    let mut mirrors = Vec::new();
    let mut skipped = Vec::new();
    let mut seen_paths = HashSet::new();

    for (index, entry) in raw.repos.into_iter().enumerate() {
        let repo = entry.repo.clone();
        match resolve_mirror(entry, &settings, poll_default, debounce_default) {
            Ok(mirror) => {
                if !seen_paths.insert(mirror.local_path.clone()) {
                    skipped.push(SkippedMirror {
                        index,
                        repo,
                        reason: format!(
                            "local_path {} is already used by another mirror",
                            mirror.local_path.display()
                        ),
                    });
                    continue;
                }
                mirrors.push(mirror);
            }
            Err(reason) => skipped.push(SkippedMirror {
                index,
                repo,
                reason,
            }),
        }
    }

    Ok(Config {
        settings,
        mirrors,
        skipped,
    })
}

fn resolve_mirror(
    entry: RawMirror,
    settings: &SyncSettings,
    poll_default: u64,
    debounce_default: u64,
) -> Result<RepositoryMirror, String> {
    let repo = non_blank(entry.repo).ok_or("missing 'repo'")?;
    let local_path = entry
        .local_path
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or("missing 'local_path'")?;
    let remote = Remote::parse(&repo).map_err(|e| e.to_string())?;

    if settings.revision_source == RevisionSourceKind::Github && remote.slug().is_none() {
        return Err(format!(
            "'{repo}' is not a GitHub repository; set revision_source to \"ls-remote\" to mirror it"
        ));
    }

    let poll = entry.poll_interval_seconds.unwrap_or(poll_default);
    let debounce = entry.debounce_seconds.unwrap_or(debounce_default);
    if poll == 0 {
        return Err("poll_interval_seconds must be at least 1".to_owned());
    }
    if debounce == 0 {
        return Err("debounce_seconds must be at least 1".to_owned());
    }

    Ok(RepositoryMirror {
        remote,
        local_path,
        branch: non_blank(entry.branch).unwrap_or_else(|| DEFAULT_BRANCH.to_owned()),
        poll_interval: Duration::from_secs(poll),
        debounce: Duration::from_secs(debounce),
    })
}

fn non_zero_global(field: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "must be at least 1".to_owned(),
        });
    }
    Ok(value)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
