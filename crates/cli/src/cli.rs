//! CLI argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clammer", about = "Talk to a clamd antivirus daemon")]
pub struct Cli {
    /// Daemon address (`unix:///path` or `tcp://host:port`)
    #[arg(long, env = "CLAMD_ADDRESS")]
    pub address: Option<String>,

    /// Read timeout in seconds
    #[arg(long, env = "CLAMMER_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Maximum INSTREAM chunk size in bytes
    #[arg(long, env = "CLAMMER_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Return whatever arrived instead of failing when a read times out
    /// (legacy behavior)
    #[arg(long)]
    pub tolerant_reads: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Health-check the daemon
    Ping,
    /// Print the daemon engine and database version
    Version,
    /// Print the daemon's scan-queue statistics
    Stats,
    /// Reload the virus definition database
    Reload,
    /// Shut the daemon down cleanly
    Shutdown,
    /// Scan a path on the daemon's filesystem
    Scan {
        path: String,
    },
    /// Scan a path recursively using multiple daemon threads
    Multiscan {
        path: String,
    },
    /// Scan a path recursively, continuing past the first match
    Contscan {
        path: String,
    },
    /// Stream a local file (stdin when omitted) to the daemon for scanning
    Instream {
        file: Option<PathBuf>,
    },
}
