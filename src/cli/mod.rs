//! CLI module for sermon-analysis.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Sermon analysis worker
///
/// Periodically picks up newly created sermons, sends their audio to a
/// generative AI provider and stores the summary, notes and discussion
/// questions it returns.
#[derive(Parser, Debug)]
#[command(name = "sermon-analysis")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "SERMON_ANALYSIS_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the analysis scheduler until interrupted
    Serve {
        /// Seconds between passes (overrides scheduler.interval_secs)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Start the status HTTP server (overrides server.enabled)
        #[arg(long)]
        status_server: bool,

        /// Port for the status server
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run a single analysis pass and exit
    RunOnce,

    /// Register a sermon for analysis
    Submit {
        /// Sermon title
        title: String,

        /// URL of the sermon audio
        audio_url: String,

        /// Date the sermon was given (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<String>,
    },

    /// List sermons
    List {
        /// Only show sermons with this status (created, pending, complete, error)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show a sermon with its notes and questions
    Show {
        /// Sermon id
        id: String,
    },

    /// Clear analysis output and queue a sermon again
    Reset {
        /// Sermon id
        id: String,
    },

    /// Check configuration, credentials and storage
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the current configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
