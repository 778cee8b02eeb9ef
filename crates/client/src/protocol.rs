//! Wire protocol for the clamd command channel.
//!
//! Wire format:
//! - Command: `n<COMMAND>\n` (the `n` sentinel selects newline-delimited
//!   replies).
//! - INSTREAM payload: `[4B len BE][len bytes]` per chunk, terminated by a
//!   zero-length prefix.
//! - Reply: text, newline-terminated; the STATS block ends with `END\n`
//!   instead, and session replies carry a leading `<id>: ` field.

use std::io::{self, Read, Write};

use bytes::{BufMut, BytesMut};

use clammer_core::{ClamError, ReadMode};

/// clamd frames its replies in units of this size.
const READ_CHUNK: usize = 4096;

/// Terminator for single-line replies.
pub const LINE_TERMINATOR: &str = "\n";
/// Terminator for the multi-line STATS block.
pub const STATS_TERMINATOR: &str = "END\n";

/// Send one command frame as a single write.
///
/// Command content is not validated; clamd rejects what it does not know.
///
/// # Errors
///
/// Returns an error if writing to the stream fails.
pub fn send_command<W: Write>(w: &mut W, command: &str) -> io::Result<()> {
    let mut frame = BytesMut::with_capacity(command.len() + 2);
    frame.put_u8(b'n');
    frame.put_slice(command.as_bytes());
    frame.put_u8(b'\n');
    w.write_all(&frame)?;
    w.flush()
}

/// Submit an in-memory payload as INSTREAM chunks of at most `max_chunk`
/// bytes, followed by the zero-length terminator.
///
/// # Errors
///
/// Returns [`ClamError::InvalidChunkSize`] for a zero `max_chunk`, or an IO
/// error if a write fails.
pub fn stream_bytes<W: Write>(
    w: &mut W,
    payload: &[u8],
    max_chunk: usize,
) -> Result<(), ClamError> {
    if max_chunk == 0 {
        return Err(ClamError::InvalidChunkSize);
    }

    for chunk in payload.chunks(max_chunk) {
        write_chunk(w, chunk)?;
    }
    finish_stream(w)?;
    Ok(())
}

/// Submit an open handle as INSTREAM chunks, reading at most `max_chunk`
/// bytes at a time until the source is exhausted.
///
/// Short reads produce short chunks; a zero-length chunk is never emitted
/// since a zero prefix is the end-of-stream marker.
///
/// # Errors
///
/// Returns [`ClamError::InvalidChunkSize`] for a zero `max_chunk`, or an IO
/// error if a read or write fails.
pub fn stream_reader<W: Write, R: Read>(
    w: &mut W,
    source: &mut R,
    max_chunk: usize,
) -> Result<(), ClamError> {
    if max_chunk == 0 {
        return Err(ClamError::InvalidChunkSize);
    }

    let mut buf = vec![0u8; max_chunk];
    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            break;
        }
        write_chunk(w, &buf[..n])?;
    }
    finish_stream(w)?;
    Ok(())
}

/// Length prefix and chunk body go out as two separate writes.
fn write_chunk<W: Write>(w: &mut W, chunk: &[u8]) -> io::Result<()> {
    let len = u32::try_from(chunk.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "chunk exceeds u32 range"))?;
    let mut prefix = BytesMut::with_capacity(4);
    prefix.put_u32(len);
    w.write_all(&prefix)?;
    w.write_all(chunk)
}

fn finish_stream<W: Write>(w: &mut W) -> io::Result<()> {
    let mut terminator = BytesMut::with_capacity(4);
    terminator.put_u32(0);
    w.write_all(&terminator)?;
    w.flush()
}

/// Accumulate a reply until its trailing bytes equal `terminator`, the peer
/// closes, or the read deadline lapses.
///
/// The deadline is the stream's recv timeout; a lapsed deadline is an error
/// in [`ReadMode::Strict`] and a silent stop in [`ReadMode::Tolerant`]. The
/// terminator is matched against the whole accumulator, so a multi-byte
/// terminator split across reads is still found.
///
/// # Errors
///
/// Returns [`ClamError::Timeout`] on a strict-mode deadline,
/// [`ClamError::MalformedReply`] for non-UTF-8 reply bytes, or the underlying
/// IO error.
pub fn read_reply<R: Read>(
    r: &mut R,
    mode: ReadMode,
    terminator: &str,
) -> Result<String, ClamError> {
    let mut acc: Vec<u8> = Vec::new();
    let mut buf = [0u8; READ_CHUNK];

    loop {
        match r.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                acc.extend_from_slice(&buf[..n]);
                if acc.ends_with(terminator.as_bytes()) {
                    break;
                }
            }
            Err(e) if is_timeout(&e) => match mode {
                ReadMode::Strict => return Err(ClamError::Timeout),
                ReadMode::Tolerant => break,
            },
            Err(e) => return Err(e.into()),
        }
    }

    String::from_utf8(acc).map_err(|e| ClamError::MalformedReply(e.to_string()))
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Strip one leading `"<digits>: "` session id, if present.
#[must_use]
pub fn strip_reply_id(reply: &str) -> &str {
    let digits = reply.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = reply[digits..].strip_prefix(": ") {
            return rest;
        }
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Cursor;

    // ─── Command framing ────────────────────────────────────────────────────

    #[test]
    fn command_frame_carries_sentinel_and_newline() {
        let mut wire = Vec::new();
        send_command(&mut wire, "PING").unwrap();
        assert_eq!(wire, b"nPING\n");
    }

    #[test]
    fn command_frame_keeps_arguments_verbatim() {
        let mut wire = Vec::new();
        send_command(&mut wire, "SCAN /tmp/some file.bin").unwrap();
        assert_eq!(wire, b"nSCAN /tmp/some file.bin\n");
    }

    // ─── INSTREAM framing ───────────────────────────────────────────────────

    /// Split captured wire bytes back into chunks; the terminator must be the
    /// final frame.
    fn decode_frames(mut wire: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        loop {
            let (prefix, rest) = wire.split_at(4);
            let len = u32::from_be_bytes(prefix.try_into().unwrap()) as usize;
            let (body, rest) = rest.split_at(len);
            frames.push(body.to_vec());
            wire = rest;
            if len == 0 {
                break;
            }
        }
        assert!(wire.is_empty(), "trailing bytes after terminator");
        frames
    }

    #[test]
    fn stream_bytes_chunks_and_terminates() {
        let mut wire = Vec::new();
        stream_bytes(&mut wire, b"abcdefgh", 3).unwrap();

        let frames = decode_frames(&wire);
        assert_eq!(frames, vec![b"abc".to_vec(), b"def".to_vec(), b"gh".to_vec(), vec![]]);
    }

    #[test]
    fn stream_bytes_chunk_count_is_ceil_of_length_over_chunk_size() {
        for (len, max_chunk) in [(0usize, 1usize), (1, 1), (1, 4), (4, 4), (5, 4), (4096, 1024)] {
            let payload = vec![0x61u8; len];
            let mut wire = Vec::new();
            stream_bytes(&mut wire, &payload, max_chunk).unwrap();

            let frames = decode_frames(&wire);
            let body_frames = &frames[..frames.len() - 1];
            assert_eq!(body_frames.len(), len.div_ceil(max_chunk));
            assert!(body_frames.iter().all(|f| !f.is_empty() && f.len() <= max_chunk));
            assert_eq!(body_frames.iter().map(Vec::len).sum::<usize>(), len);
            assert!(frames.last().unwrap().is_empty());
        }
    }

    #[test]
    fn stream_bytes_empty_payload_sends_only_terminator() {
        let mut wire = Vec::new();
        stream_bytes(&mut wire, b"", 1024).unwrap();
        assert_eq!(wire, [0, 0, 0, 0]);
    }

    #[test]
    fn stream_bytes_rejects_zero_chunk_size() {
        let mut wire = Vec::new();
        assert!(matches!(
            stream_bytes(&mut wire, b"abc", 0),
            Err(ClamError::InvalidChunkSize)
        ));
        assert!(wire.is_empty());
    }

    #[test]
    fn stream_reader_matches_buffer_framing() {
        let payload = b"The quick brown fox jumps over the lazy dog";

        let mut from_reader = Vec::new();
        stream_reader(&mut from_reader, &mut Cursor::new(payload), 8).unwrap();

        let mut from_bytes = Vec::new();
        stream_bytes(&mut from_bytes, payload, 8).unwrap();

        assert_eq!(from_reader, from_bytes);
    }

    #[test]
    fn stream_reader_rejects_zero_chunk_size() {
        let mut wire = Vec::new();
        assert!(matches!(
            stream_reader(&mut wire, &mut Cursor::new(b"abc"), 0),
            Err(ClamError::InvalidChunkSize)
        ));
    }

    // ─── Reply accumulation ─────────────────────────────────────────────────

    /// Scripted read sequence: data chunks, timeouts, then EOF.
    enum ReadEvent {
        Data(&'static [u8]),
        TimedOut,
    }

    struct ScriptedStream {
        events: VecDeque<ReadEvent>,
    }

    impl ScriptedStream {
        fn new(events: impl IntoIterator<Item = ReadEvent>) -> Self {
            Self {
                events: events.into_iter().collect(),
            }
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.events.pop_front() {
                Some(ReadEvent::Data(data)) => {
                    buf[..data.len()].copy_from_slice(data);
                    Ok(data.len())
                }
                Some(ReadEvent::TimedOut) => {
                    Err(io::Error::new(io::ErrorKind::WouldBlock, "read timed out"))
                }
                None => Ok(0),
            }
        }
    }

    #[test]
    fn read_reply_stops_at_newline() {
        let mut stream = ScriptedStream::new([ReadEvent::Data(b"PONG\n")]);
        let reply = read_reply(&mut stream, ReadMode::Strict, LINE_TERMINATOR).unwrap();
        assert_eq!(reply, "PONG\n");
    }

    #[test]
    fn read_reply_accumulates_until_stats_terminator() {
        let mut stream = ScriptedStream::new([
            ReadEvent::Data(b"POOLS:\n"),
            ReadEvent::Data(b"BLA\n"),
            ReadEvent::Data(b"END\n"),
        ]);
        let reply = read_reply(&mut stream, ReadMode::Strict, STATS_TERMINATOR).unwrap();
        assert_eq!(reply, "POOLS:\nBLA\nEND\n");
    }

    #[test]
    fn read_reply_matches_terminator_split_across_reads() {
        let mut stream = ScriptedStream::new([
            ReadEvent::Data(b"STATE: VALID\nEN"),
            ReadEvent::Data(b"D\n"),
        ]);
        let reply = read_reply(&mut stream, ReadMode::Strict, STATS_TERMINATOR).unwrap();
        assert_eq!(reply, "STATE: VALID\nEND\n");
    }

    #[test]
    fn read_reply_embedded_newline_does_not_end_stats_block() {
        let mut stream = ScriptedStream::new([
            ReadEvent::Data(b"POOLS: 1\n\nSTATE: VALID PRIMARY\nEND\n"),
        ]);
        let reply = read_reply(&mut stream, ReadMode::Strict, STATS_TERMINATOR).unwrap();
        assert!(reply.ends_with("END\n"));
    }

    #[test]
    fn read_reply_stops_on_peer_close() {
        let mut stream = ScriptedStream::new([ReadEvent::Data(b"partial")]);
        let reply = read_reply(&mut stream, ReadMode::Strict, LINE_TERMINATOR).unwrap();
        assert_eq!(reply, "partial");
    }

    #[test]
    fn read_reply_strict_mode_fails_on_timeout() {
        let mut stream = ScriptedStream::new([
            ReadEvent::Data(b"half a rep"),
            ReadEvent::TimedOut,
        ]);
        assert!(matches!(
            read_reply(&mut stream, ReadMode::Strict, LINE_TERMINATOR),
            Err(ClamError::Timeout)
        ));
    }

    #[test]
    fn read_reply_tolerant_mode_returns_partial_data_on_timeout() {
        let mut stream = ScriptedStream::new([
            ReadEvent::Data(b"half a rep"),
            ReadEvent::TimedOut,
        ]);
        let reply = read_reply(&mut stream, ReadMode::Tolerant, LINE_TERMINATOR).unwrap();
        assert_eq!(reply, "half a rep");
    }

    #[test]
    fn read_reply_tolerant_mode_returns_empty_on_immediate_timeout() {
        let mut stream = ScriptedStream::new([ReadEvent::TimedOut]);
        let reply = read_reply(&mut stream, ReadMode::Tolerant, LINE_TERMINATOR).unwrap();
        assert_eq!(reply, "");
    }

    #[test]
    fn read_reply_rejects_non_utf8() {
        let mut stream = ScriptedStream::new([ReadEvent::Data(b"\xff\xfe\n")]);
        assert!(matches!(
            read_reply(&mut stream, ReadMode::Strict, LINE_TERMINATOR),
            Err(ClamError::MalformedReply(_))
        ));
    }

    // ─── Session id stripping ───────────────────────────────────────────────

    #[test]
    fn strip_reply_id_removes_one_prefix() {
        assert_eq!(strip_reply_id("1: PONG"), "PONG");
        assert_eq!(strip_reply_id("42: ClamAV 1.4.2"), "ClamAV 1.4.2");
        assert_eq!(strip_reply_id("2: 3: nested"), "3: nested");
    }

    #[test]
    fn strip_reply_id_leaves_unprefixed_replies_alone() {
        assert_eq!(strip_reply_id("PONG"), "PONG");
        assert_eq!(strip_reply_id("a1: PONG"), "a1: PONG");
        assert_eq!(strip_reply_id(": PONG"), ": PONG");
        assert_eq!(strip_reply_id(""), "");
    }
}
