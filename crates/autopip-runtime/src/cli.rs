//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "autopip", about = "automatic Picture-in-Picture decision engine")]
pub struct Cli {
    /// Settings file (.toml or .json); built-in defaults when absent
    #[arg(long, short = 'c', global = true, env = "AUTOPIP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Replay a scenario through the simulated browser
    Replay(ReplayOpts),
    /// Print the effective settings (JSON)
    Config,
    /// Print per-site feature toggles
    Sites,
    /// Classify a viewport as collapsed or expanded
    Classify(ClassifyOpts),
}

#[derive(clap::Args)]
pub struct ReplayOpts {
    /// Scenario file (JSON)
    pub scenario: PathBuf,

    /// Print the trace and verdict as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args)]
pub struct ClassifyOpts {
    /// Viewport width in CSS pixels
    #[arg(long)]
    pub width: u32,

    /// Viewport height in CSS pixels
    #[arg(long)]
    pub height: u32,
}

/// Log filter: AUTOPIP_LOG, then RUST_LOG, then `fallback`.
pub fn log_filter(fallback: &str) -> String {
    std::env::var("AUTOPIP_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| fallback.to_string())
}
