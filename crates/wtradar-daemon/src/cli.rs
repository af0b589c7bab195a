//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use wtradar_daemon::presenter::OutputFormat;
use wtradar_daemon::types::FeedKind;

#[derive(Parser)]
#[command(name = "wtradar", about = "battle log and chat radar", version)]
pub struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/wtradar/config.toml)
    #[arg(long, short = 'c', global = true, env = "WTRADAR_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile telemetry and print a frame per redraw
    Run(RunOpts),
    /// Show the effective configuration
    Config,
}

#[derive(clap::Args)]
pub struct RunOpts {
    /// Telemetry file of JSON lines (default: stdin)
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    /// Frame format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Only print frames for one feed (battle_log or chat)
    #[arg(long)]
    pub feed: Option<FeedKind>,
}
