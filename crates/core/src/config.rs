//! Runtime configuration for the clamd client.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ClamError;

/// Conventional clamd control socket on Debian-style installs.
pub const DEFAULT_UNIX_SOCKET: &str = "/var/run/clamav/clamd.ctl";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default INSTREAM chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// How the reply reader treats a readiness timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadMode {
    /// Fail the in-flight command with [`ClamError::Timeout`].
    #[default]
    Strict,
    /// Return whatever has been accumulated, possibly nothing. Kept for
    /// compatibility with peers that relied on the old silent-stop behavior.
    Tolerant,
}

/// Parsed daemon location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// `unix:///absolute/path` stream socket.
    Unix(PathBuf),
    /// `tcp://host:port`.
    Tcp(String),
}

impl FromStr for Address {
    type Err = ClamError;

    fn from_str(s: &str) -> Result<Self, ClamError> {
        if let Some(path) = s.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(ClamError::Address(s.to_string()));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if let Some(hostport) = s.strip_prefix("tcp://") {
            if hostport.is_empty() {
                return Err(ClamError::Address(s.to_string()));
            }
            return Ok(Self::Tcp(hostport.to_string()));
        }
        Err(ClamError::Address(s.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
            Self::Tcp(hostport) => write!(f, "tcp://{hostport}"),
        }
    }
}

/// Connection settings for a client.
#[derive(Debug, Clone)]
pub struct Config {
    pub address: Address,
    /// Bound on every send and on each readiness wait before a read.
    pub timeout: Duration,
    pub read_mode: ReadMode,
    /// Default INSTREAM chunk size.
    pub chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: Address::Unix(PathBuf::from(DEFAULT_UNIX_SOCKET)),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            read_mode: ReadMode::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Optional on-disk defaults (`~/.config/clammer/config.toml`). Every field
/// may be overridden by CLI flags or environment variables.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub address: Option<String>,
    pub timeout_secs: Option<u64>,
    pub chunk_size: Option<usize>,
    pub tolerant_reads: Option<bool>,
}

impl FileConfig {
    /// Load from the default path. A missing file yields defaults; an
    /// unreadable or unparsable file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> crate::Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("failed to read {}: {e}", path.display()))?;

        toml::from_str(&content)
            .map_err(|e| eyre::eyre!("failed to parse {}: {e}", path.display()))
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".config").join("clammer").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parses_unix_scheme() {
        let addr: Address = "unix:///var/run/clamav/clamd.ctl".parse().unwrap();
        assert_eq!(addr, Address::Unix(PathBuf::from("/var/run/clamav/clamd.ctl")));
    }

    #[test]
    fn address_parses_tcp_scheme() {
        let addr: Address = "tcp://127.0.0.1:3310".parse().unwrap();
        assert_eq!(addr, Address::Tcp("127.0.0.1:3310".to_string()));
    }

    #[test]
    fn address_rejects_unknown_scheme() {
        assert!(matches!(
            "/var/run/clamav/clamd.ctl".parse::<Address>(),
            Err(ClamError::Address(_))
        ));
        assert!(matches!("udp://x:1".parse::<Address>(), Err(ClamError::Address(_))));
        assert!(matches!("tcp://".parse::<Address>(), Err(ClamError::Address(_))));
    }

    #[test]
    fn address_display_round_trips() {
        for raw in ["unix:///run/clamd.sock", "tcp://localhost:3310"] {
            let addr: Address = raw.parse().unwrap();
            assert_eq!(addr.to_string(), raw);
        }
    }

    #[test]
    fn default_config_is_strict_unix() {
        let config = Config::default();
        assert_eq!(config.read_mode, ReadMode::Strict);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.chunk_size, 1024);
        assert!(matches!(config.address, Address::Unix(_)));
    }

    #[test]
    fn file_config_loads_partial_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "address = \"tcp://scanner:3310\"\ntimeout_secs = 5\n").unwrap();

        let file = FileConfig::load_from(&path).unwrap();
        assert_eq!(file.address.as_deref(), Some("tcp://scanner:3310"));
        assert_eq!(file.timeout_secs, Some(5));
        assert_eq!(file.chunk_size, None);
        assert_eq!(file.tolerant_reads, None);
    }

    #[test]
    fn file_config_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timeout_secs = \"soon\"").unwrap();

        assert!(FileConfig::load_from(&path).is_err());
    }
}
