//! Core protocol types for the clamd client - scan verdicts, reply parsing,
//! configuration. No socket dependencies.

pub mod config;
pub mod error;
pub mod reply;

pub use config::{Address, Config, FileConfig, ReadMode};
pub use error::{ClamError, Result};
pub use reply::{parse_reply, ScanResult};
