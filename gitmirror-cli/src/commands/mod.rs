pub mod check;
pub mod run;

use std::path::PathBuf;

use clap::Args;

use gitmirror_core::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};

/// `--config`, shared by every subcommand.
#[derive(Args, Debug)]
pub struct ConfigArg {
    /// Path to the JSON or YAML configuration file.
    #[arg(long, short = 'c', env = CONFIG_PATH_ENV, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}
