//! Structured verdicts parsed from raw clamd replies.
//!
//! A scan reply is `<filename>: OK` or `<filename>: <reason> <STATUS>`, with a
//! leading `<id>: ` field when the connection is in an IDSESSION.

use crate::error::ClamError;

const STATUS_OK: &str = "OK";
const STATUS_FOUND: &str = "FOUND";
const STATUS_ERROR: &str = "ERROR";

/// Verdict clamd reported for a single scan target.
///
/// `status` is the daemon's trailing token, normally `OK`, `FOUND` or `ERROR`
/// but kept verbatim for anything else the daemon emits. `filename` is the
/// reported target path, or the literal `stream` for INSTREAM submissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    status: String,
    filename: String,
    reason: Option<String>,
    id: Option<String>,
}

impl ScanResult {
    /// Raw status token.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// The target the daemon reported against.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Explanation for a non-`OK` status, e.g. the matched signature name.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Daemon-assigned sequence number, present only for session replies.
    /// Opaque: the daemon numbers replies 1-based per session, but nothing is
    /// validated or correlated against it.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.status != STATUS_OK
    }

    #[must_use]
    pub fn is_found(&self) -> bool {
        self.status == STATUS_FOUND
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == STATUS_ERROR
    }
}

/// Parse a trimmed clamd reply line into a [`ScanResult`].
///
/// Fields are delimited by `": "`: `id` (session replies only), `filename`,
/// then the verdict message. A reply with fewer fields than expected is a
/// [`ClamError::MalformedReply`].
///
/// Known limitation: a filename that itself contains `": "` desynchronizes
/// the split, and the wire protocol offers no escaping for it. The first
/// split wins, matching what clamd peers have always done.
///
/// # Errors
///
/// Returns [`ClamError::MalformedReply`] when a field is missing.
pub fn parse_reply(raw: &str, in_session: bool) -> Result<ScanResult, ClamError> {
    let mut fields = raw.split(": ");

    let id = if in_session {
        Some(next_field(&mut fields, raw)?.to_string())
    } else {
        None
    };
    let filename = next_field(&mut fields, raw)?.to_string();
    let message = next_field(&mut fields, raw)?;

    if message == STATUS_OK {
        return Ok(ScanResult {
            status: STATUS_OK.to_string(),
            filename,
            reason: None,
            id,
        });
    }

    let mut parts: Vec<&str> = message.split(' ').collect();
    let status = parts.pop().unwrap_or_default().to_string();
    let reason = parts.join(" ");

    Ok(ScanResult {
        status,
        filename,
        reason: Some(reason),
        id,
    })
}

fn next_field<'a>(
    fields: &mut std::str::Split<'a, &str>,
    raw: &str,
) -> Result<&'a str, ClamError> {
    fields
        .next()
        .ok_or_else(|| ClamError::MalformedReply(raw.to_string()))
}
