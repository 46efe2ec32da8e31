use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "showtrack",
    version,
    about = "Track the last watched episode of your TV shows and see what aired since"
)]
pub struct Cli {
    /// Record file (defaults to <data dir>/showtrack/shows.dex)
    #[arg(long, global = true, env = "SHOWTRACK_FILE")]
    pub file: Option<PathBuf>,

    /// Base URL of the TVMaze-compatible catalog API
    #[arg(
        long,
        global = true,
        env = "SHOWTRACK_API_BASE",
        default_value = "https://api.tvmaze.com"
    )]
    pub api_base: String,

    /// Maximum number of catalog requests in flight
    #[arg(long, global = true, env = "SHOWTRACK_CONCURRENCY", default_value_t = 4)]
    pub concurrency: usize,

    /// Per-request read timeout in seconds
    #[arg(long, global = true, env = "SHOWTRACK_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show every tracked show with unseen and unaired counts
    List,
    /// Record EPISODE (SxxEyy or DONE) as the last watched episode of SHOW_ID
    Watch {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        show_id: u32,
        episode: String,
    },
    /// Mark the next aired episode of SHOW_ID as watched
    Next {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        show_id: u32,
    },
    /// Start tracking SHOW_ID
    Add {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        show_id: u32,
    },
    /// Stop tracking SHOW_ID (not supported yet)
    Delete {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        show_id: u32,
    },
    /// Look up a show ID by name in the catalog
    Search { name: String },
    /// Create a new record file
    Init,
}
