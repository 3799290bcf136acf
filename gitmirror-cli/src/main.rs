//! gitmirror — keep local directories and git remotes in sync both ways.
//!
//! # Usage
//!
//! ```text
//! gitmirror run   [--config <path>] [--log-format text|json]
//! gitmirror check [--config <path>] [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, run::RunArgs};

#[derive(Parser, Debug)]
#[command(
    name = "gitmirror",
    version,
    about = "Mirror git repositories to local directories and push local edits back",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start every configured mirror and run until interrupted.
    Run(RunArgs),

    /// Validate the configuration and show the resolved mirrors.
    Check(CheckArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Check(args) => args.run(),
    }
}
