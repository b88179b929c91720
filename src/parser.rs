//! Internal module turning IMAP FETCH responses into [`MailMessage`]s.

use crate::message::MailMessage;
use async_imap::types::{Fetch, Flag};
use chrono::{DateTime, TimeZone, Utc};
use mailparse::parse_header;
use tracing::debug;

/// Why a fetched message could not be turned into a [`MailMessage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The server did not return a UID.
    MissingUid,
    /// The server did not return an envelope.
    MissingEnvelope,
    /// Neither INTERNALDATE nor a parsable `Date` header was present.
    MissingDate,
    /// The response stream yielded an error for this item.
    Stream(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingUid => write!(f, "missing UID"),
            SkipReason::MissingEnvelope => write!(f, "missing envelope"),
            SkipReason::MissingDate => write!(f, "missing received date"),
            SkipReason::Stream(e) => write!(f, "fetch stream error: {e}"),
        }
    }
}

/// Builds a [`MailMessage`] from a FETCH response carrying
/// `UID FLAGS ENVELOPE INTERNALDATE`.
pub(crate) fn message_from_fetch(fetch: &Fetch) -> Result<MailMessage, SkipReason> {
    let uid = fetch.uid.ok_or(SkipReason::MissingUid)?;
    let envelope = fetch.envelope().ok_or(SkipReason::MissingEnvelope)?;

    let sender_address = envelope.from.as_deref().and_then(|addresses| {
        addresses
            .iter()
            .find_map(|a| sender_from_parts(a.mailbox.as_deref(), a.host.as_deref()))
    });

    let subject = envelope
        .subject
        .as_deref()
        .map(decode_header_text)
        .unwrap_or_default();

    let received_at = fetch
        .internal_date()
        .map(|date| date.with_timezone(&Utc))
        .or_else(|| envelope.date.as_deref().and_then(parse_date_header))
        .ok_or(SkipReason::MissingDate)?;

    let is_seen = fetch.flags().any(|flag| matches!(flag, Flag::Seen));

    debug!(uid, is_seen, has_sender = sender_address.is_some(), "Parsed message");

    Ok(MailMessage {
        uid,
        sender_address,
        subject,
        received_at,
        is_seen,
    })
}

/// Joins an envelope address's mailbox and host parts into `mailbox@host`.
///
/// Group markers (no host) and empty parts yield `None`.
fn sender_from_parts(mailbox: Option<&[u8]>, host: Option<&[u8]>) -> Option<String> {
    let mailbox = decode_header_text(mailbox?);
    let host = decode_header_text(host?);
    if mailbox.is_empty() || host.is_empty() {
        return None;
    }
    Some(format!("{mailbox}@{host}"))
}

/// Decodes RFC 2047 encoded words; raw bytes are read as lossy UTF-8 otherwise.
fn decode_header_text(raw: &[u8]) -> String {
    let mut line = b"X: ".to_vec();
    line.extend_from_slice(raw);
    match parse_header(&line) {
        Ok((header, _)) => header.get_value().trim().to_string(),
        Err(_) => String::from_utf8_lossy(raw).trim().to_string(),
    }
}

fn parse_date_header(raw: &[u8]) -> Option<DateTime<Utc>> {
    let text = String::from_utf8_lossy(raw);
    let timestamp = mailparse::dateparse(text.trim()).ok()?;
    Utc.timestamp_opt(timestamp, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_from_parts() {
        assert_eq!(
            sender_from_parts(Some(&b"alice"[..]), Some(&b"Example.com"[..])).as_deref(),
            Some("alice@Example.com")
        );
        assert_eq!(sender_from_parts(Some(&b"group"[..]), None), None);
        assert_eq!(sender_from_parts(Some(&b""[..]), Some(&b"example.com"[..])), None);
    }

    #[test]
    fn test_decode_plain_subject() {
        assert_eq!(decode_header_text(b"Quarterly report"), "Quarterly report");
    }

    #[test]
    fn test_decode_encoded_subject() {
        assert_eq!(
            decode_header_text(b"=?UTF-8?B?7JWI64WV7ZWY7IS47JqU?="),
            "안녕하세요"
        );
        assert_eq!(
            decode_header_text(b"=?ISO-8859-1?Q?Caf=E9_menu?="),
            "Café menu"
        );
    }

    #[test]
    fn test_parse_date_header() {
        let date = parse_date_header(b"Tue, 1 Jul 2003 10:52:37 +0200").unwrap();
        assert_eq!(date.to_rfc3339(), "2003-07-01T08:52:37+00:00");
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::MissingEnvelope.to_string(), "missing envelope");
        assert_eq!(
            SkipReason::Stream("bye".into()).to_string(),
            "fetch stream error: bye"
        );
    }
}
