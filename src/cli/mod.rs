//! CLI module for Hark.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Hark - semantic search over transcribed audio segments
///
/// Finds the indexed audio segments whose transcripts are closest in meaning
/// to a free-text query.
#[derive(Parser, Debug)]
#[command(name = "hark")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search for audio segments matching a query
    Search {
        /// Search query
        query: String,

        /// Maximum number of results (defaults to search.default_limit)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the loaded index and embedding model
    Info,

    /// Start HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

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
}
