//! Synchronous clamd client.

use std::io::Read;
use std::path::Path;

use tracing::{debug, trace};

use clammer_core::{parse_reply, ClamError, Config, ReadMode, ScanResult};

use crate::protocol::{self, LINE_TERMINATOR, STATS_TERMINATOR};
use crate::transport::Stream;

/// Whether the connection is multiplexing commands through an IDSESSION.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    InSession,
}

impl SessionState {
    #[must_use]
    pub const fn in_session(self) -> bool {
        matches!(self, Self::InSession)
    }
}

/// A client driving one connection to clamd.
///
/// The protocol is strictly half-duplex: one outstanding command at a time,
/// replies in issue order. Outside a session every exchange is one-shot; the
/// daemon closes its end after replying and the client releases the stream,
/// so a fresh `Client` is needed per command. Within a session
/// ([`Client::start_session`]) the connection stays open and each reply
/// carries a daemon-assigned sequence id.
///
/// No internal synchronization: a `Client` must not be shared across
/// concurrent callers without external locking.
pub struct Client {
    stream: Option<Stream>,
    read_mode: ReadMode,
    session: SessionState,
}

impl Client {
    /// Connect to the daemon named by `config.address`.
    ///
    /// # Errors
    ///
    /// Returns [`ClamError::Connect`] if the connection cannot be
    /// established.
    pub fn connect(config: &Config) -> Result<Self, ClamError> {
        debug!(address = %config.address, timeout = ?config.timeout, "connecting to clamd");
        let stream = Stream::connect(&config.address, config.timeout)?;
        Ok(Self {
            stream: Some(stream),
            read_mode: config.read_mode,
            session: SessionState::Idle,
        })
    }

    /// Health check.
    ///
    /// # Errors
    ///
    /// Returns [`ClamError::UnexpectedReply`] for anything but a literal
    /// `PONG`, including an empty reply.
    pub fn ping(&mut self) -> Result<bool, ClamError> {
        self.send_command("PING")?;
        let reply = self.receive(LINE_TERMINATOR, true)?;
        if reply == "PONG" {
            Ok(true)
        } else {
            Err(ClamError::UnexpectedReply(reply))
        }
    }

    /// Daemon and database version string.
    ///
    /// # Errors
    ///
    /// Fails if the exchange fails.
    pub fn version(&mut self) -> Result<String, ClamError> {
        self.send_command("VERSION")?;
        self.receive(LINE_TERMINATOR, true)
    }

    /// Scan-queue statistics, a multi-line block ending in `END`.
    ///
    /// # Errors
    ///
    /// Fails if the exchange fails.
    pub fn stats(&mut self) -> Result<String, ClamError> {
        self.send_command("STATS")?;
        self.receive(STATS_TERMINATOR, true)
    }

    /// Reload the virus definition database.
    ///
    /// # Errors
    ///
    /// Fails if the exchange fails.
    pub fn reload(&mut self) -> Result<String, ClamError> {
        self.send_command("RELOAD")?;
        self.receive(LINE_TERMINATOR, false)
    }

    /// Shut the daemon down cleanly. The reply is empty; the daemon closes
    /// the connection.
    ///
    /// # Errors
    ///
    /// Fails if the exchange fails.
    pub fn shutdown(&mut self) -> Result<String, ClamError> {
        self.send_command("SHUTDOWN")?;
        self.receive(LINE_TERMINATOR, false)
    }

    /// Scan a single path on the daemon's filesystem.
    ///
    /// # Errors
    ///
    /// Fails if the exchange fails or the reply cannot be parsed.
    pub fn scan_file(&mut self, path: &str) -> Result<ScanResult, ClamError> {
        self.scan_command(&format!("SCAN {path}"))
    }

    /// Scan a path recursively using multiple daemon threads.
    ///
    /// # Errors
    ///
    /// Fails if the exchange fails or the reply cannot be parsed.
    pub fn multiscan_file(&mut self, path: &str) -> Result<ScanResult, ClamError> {
        self.scan_command(&format!("MULTISCAN {path}"))
    }

    /// Scan a path recursively, continuing past the first match.
    ///
    /// # Errors
    ///
    /// Fails if the exchange fails or the reply cannot be parsed.
    pub fn cont_scan(&mut self, path: &str) -> Result<ScanResult, ClamError> {
        self.scan_command(&format!("CONTSCAN {path}"))
    }

    /// Read a local file into memory and submit it via INSTREAM. The daemon
    /// reports the verdict against the literal target `stream`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or the submission fails.
    pub fn scan_local_file(
        &mut self,
        path: impl AsRef<Path>,
        max_chunk: usize,
    ) -> Result<ScanResult, ClamError> {
        let contents = std::fs::read(path.as_ref())?;
        debug!(path = %path.as_ref().display(), len = contents.len(), "streaming local file");
        self.scan_bytes(&contents, max_chunk)
    }

    /// Submit an in-memory payload via INSTREAM.
    ///
    /// # Errors
    ///
    /// Returns [`ClamError::InvalidChunkSize`] for a zero `max_chunk`, or
    /// fails if the submission fails.
    pub fn scan_bytes(&mut self, payload: &[u8], max_chunk: usize) -> Result<ScanResult, ClamError> {
        if max_chunk == 0 {
            return Err(ClamError::InvalidChunkSize);
        }
        trace!(len = payload.len(), max_chunk, "INSTREAM payload");
        self.send_command("INSTREAM")?;
        protocol::stream_bytes(self.stream_mut()?, payload, max_chunk)?;
        self.read_verdict()
    }

    /// Submit an open handle via INSTREAM, reading it incrementally.
    ///
    /// # Errors
    ///
    /// Returns [`ClamError::InvalidChunkSize`] for a zero `max_chunk`, or
    /// fails if the source cannot be read or the submission fails.
    pub fn scan_reader<R: Read>(
        &mut self,
        source: &mut R,
        max_chunk: usize,
    ) -> Result<ScanResult, ClamError> {
        if max_chunk == 0 {
            return Err(ClamError::InvalidChunkSize);
        }
        self.send_command("INSTREAM")?;
        protocol::stream_reader(self.stream_mut()?, source, max_chunk)?;
        self.read_verdict()
    }

    /// Enter session mode. No reply is awaited; subsequent replies carry a
    /// daemon-assigned `<id>: ` prefix and the connection stays open across
    /// commands until [`Client::end_session`].
    ///
    /// # Errors
    ///
    /// Fails if the command cannot be sent.
    pub fn start_session(&mut self) -> Result<(), ClamError> {
        debug!("starting IDSESSION");
        self.session = SessionState::InSession;
        self.send_command("IDSESSION")
    }

    /// Leave session mode. No reply is awaited; the caller closes the
    /// connection explicitly via [`Client::disconnect`].
    ///
    /// # Errors
    ///
    /// Fails if the command cannot be sent.
    pub fn end_session(&mut self) -> Result<(), ClamError> {
        debug!("ending IDSESSION");
        self.send_command("END")?;
        self.session = SessionState::Idle;
        Ok(())
    }

    /// Close the connection.
    pub fn disconnect(&mut self) {
        self.stream = None;
    }

    #[must_use]
    pub const fn session(&self) -> SessionState {
        self.session
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn scan_command(&mut self, command: &str) -> Result<ScanResult, ClamError> {
        self.send_command(command)?;
        self.read_verdict()
    }

    fn read_verdict(&mut self) -> Result<ScanResult, ClamError> {
        let in_session = self.session.in_session();
        let reply = self.receive(LINE_TERMINATOR, false)?;
        parse_reply(&reply, in_session)
    }

    fn send_command(&mut self, command: &str) -> Result<(), ClamError> {
        trace!(command, "sending command");
        protocol::send_command(self.stream_mut()?, command)?;
        Ok(())
    }

    /// Blocking receive loop plus the post-read protocol conventions: outside
    /// a session the exchange is one-shot and the stream is released; inside
    /// a session single-value replies get their `<id>: ` prefix stripped when
    /// `strip_id` is set (scan verdicts keep it for the parser instead).
    fn receive(&mut self, terminator: &str, strip_id: bool) -> Result<String, ClamError> {
        let mode = self.read_mode;
        let raw = protocol::read_reply(self.stream_mut()?, mode, terminator)?;
        trace!(len = raw.len(), "received reply");

        let reply = if self.session.in_session() {
            if strip_id {
                protocol::strip_reply_id(&raw).to_string()
            } else {
                raw
            }
        } else {
            self.stream = None;
            raw
        };

        Ok(reply.trim().to_string())
    }

    fn stream_mut(&mut self) -> Result<&mut Stream, ClamError> {
        self.stream.as_mut().ok_or(ClamError::Disconnected)
    }
}
