//! `gitmirror check` — show what `run` would mirror.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use gitmirror_core::{config, Config};

use super::ConfigArg;

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let path = &self.config.config;
        let config = config::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;

        if self.json {
            print_json(&config)?;
        } else {
            print_table(&config);
        }

        if config.mirrors.is_empty() {
            bail!(
                "no usable mirrors in {} ({} skipped)",
                path.display(),
                config.skipped.len()
            );
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct CheckReportJson {
    settings: SettingsJson,
    mirrors: Vec<MirrorJson>,
    skipped: Vec<SkippedJson>,
}

#[derive(Serialize)]
struct SettingsJson {
    revision_source: String,
    pull_before_push: bool,
    exclusive_sync: bool,
    git_user_name: String,
    git_user_email: String,
    commit_message: String,
    token: bool,
}

#[derive(Serialize)]
struct MirrorJson {
    repo: String,
    clone_url: String,
    local_path: String,
    branch: String,
    poll_interval_seconds: u64,
    debounce_seconds: u64,
}

#[derive(Serialize)]
struct SkippedJson {
    index: usize,
    repo: Option<String>,
    reason: String,
}

#[derive(Tabled)]
struct MirrorTableRow {
    #[tabled(rename = "remote")]
    remote: String,
    #[tabled(rename = "local path")]
    local_path: String,
    #[tabled(rename = "branch")]
    branch: String,
    #[tabled(rename = "poll")]
    poll: String,
    #[tabled(rename = "debounce")]
    debounce: String,
}

fn print_json(config: &Config) -> Result<()> {
    let settings = &config.settings;
    let payload = CheckReportJson {
        settings: SettingsJson {
            revision_source: settings.revision_source.to_string(),
            pull_before_push: settings.pull_before_push,
            exclusive_sync: settings.exclusive_sync,
            git_user_name: settings.identity.name.clone(),
            git_user_email: settings.identity.email.clone(),
            commit_message: settings.commit_message.clone(),
            token: settings.credential.is_some(),
        },
        mirrors: config
            .mirrors
            .iter()
            .map(|m| MirrorJson {
                repo: m.remote.as_str().to_owned(),
                clone_url: m.remote.clone_url().to_owned(),
                local_path: m.local_path.display().to_string(),
                branch: m.branch.clone(),
                poll_interval_seconds: m.poll_interval.as_secs(),
                debounce_seconds: m.debounce.as_secs(),
            })
            .collect(),
        skipped: config
            .skipped
            .iter()
            .map(|s| SkippedJson {
                index: s.index,
                repo: s.repo.clone(),
                reason: s.reason.clone(),
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize check JSON")?
    );
    Ok(())
}

fn print_table(config: &Config) {
    let settings = &config.settings;
    println!(
        "gitmirror v{} | {} mirrors | source: {} | token: {} | pull before push: {}",
        env!("CARGO_PKG_VERSION"),
        config.mirrors.len(),
        settings.revision_source,
        if settings.credential.is_some() { "set" } else { "unset" },
        settings.pull_before_push,
    );

    if !config.mirrors.is_empty() {
        let rows: Vec<MirrorTableRow> = config
            .mirrors
            .iter()
            .map(|m| MirrorTableRow {
                remote: m.remote.to_string(),
                local_path: m.local_path.display().to_string(),
                branch: m.branch.clone(),
                poll: format!("{}s", m.poll_interval.as_secs()),
                debounce: format!("{}s", m.debounce.as_secs()),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    for skipped in &config.skipped {
        let label = skipped.repo.as_deref().unwrap_or("<no repo>");
        println!(
            "{} entry {} ({}): {}",
            "skipped".yellow().bold(),
            skipped.index,
            label,
            skipped.reason
        );
    }
}
