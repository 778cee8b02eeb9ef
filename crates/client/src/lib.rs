//! Synchronous client for the clamd antivirus scanning daemon.
//!
//! clamd speaks a line-oriented command/response protocol over a Unix-domain
//! or TCP stream socket. [`Client`] covers the daemon's command vocabulary:
//! health checks, version and stats queries, administrative commands,
//! path-based scans, INSTREAM payload submission and IDSESSION multiplexing.

pub mod client;
pub mod protocol;
pub mod transport;

pub use client::{Client, SessionState};
pub use transport::Stream;

pub use clammer_core::{parse_reply, Address, ClamError, Config, ReadMode, ScanResult};
