//! `gitmirror run` — foreground daemon.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use gitmirror_core::config;
use gitmirror_daemon::{start_blocking, LogFormat};

use super::ConfigArg;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormatArg {
    #[default]
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Log line format on stderr.
    #[arg(long, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let path = &self.config.config;
        let config = config::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;
        start_blocking(config, self.log_format.into()).context("daemon exited with error")
    }
}
