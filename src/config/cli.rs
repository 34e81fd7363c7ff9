use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "sorting-monitor")]
#[command(about = "分揀進度採集、基準比對與即時看板")]
pub struct Cli {
    /// Path to TOML configuration file (defaults to ./monitor.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Poll the API on the configured interval and append results to the data directory
    Collect {
        /// Run a single collection and exit
        #[arg(long)]
        once: bool,
    },

    /// Compare current progress with the baseline without writing any files
    Check {
        /// Print API diagnostics
        #[arg(long)]
        debug: bool,

        /// Keep running and refresh periodically
        #[arg(long)]
        watch: bool,

        /// Refresh interval in watch mode
        #[arg(long, default_value = "30")]
        interval_seconds: u64,
    },

    /// Serve the live progress dashboard
    Dashboard {
        /// Preferred port; the next free port is used when taken
        #[arg(long)]
        port: Option<u16>,

        /// Bind address
        #[arg(long)]
        bind: Option<String>,

        /// Do not open a browser window
        #[arg(long)]
        no_browser: bool,
    },
}
