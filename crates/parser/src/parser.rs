//! Winnow-based parser for load-generator log lines.
//!
//! Grammar:
//! ```text
//! line      = "*"? field SEP field SEP kind SEP payload
//! SEP       = ", "
//! field     = <shortest text up to SEP>
//! payload   = <rest of the line>
//!
//! Read, Write, TxRead, TxWrite payload = map ":" key "=" value ("," version)?
//! Rm, TxRm payload                     = map ":" key ("," version)?
//! TxSnap, TxOpt, TxNest, TxAWA payload = ("start" | "end" | "aborted") ("," version)?
//! Version payload                      = version
//! Liveness payload                     = (text ",")* ("Success" | "Fail")
//! ```
//!
//! Fields are trimmed. A read value of `null` records that no value was
//! observed.

use kvoracle_core::types::{IsolationKind, Key, TxPhase, Version};
use kvoracle_core::{Action, Error, Operation};
use winnow::ascii::dec_int;
use winnow::combinator::terminated;
use winnow::prelude::*;
use winnow::token::{rest, take_until};
use winnow::ModalResult;

use crate::lexer::{operation_kind, TokenKind};

/// Field separator of a log line.
pub const SEPARATOR: &str = ", ";

/// Marker of a line copied into more than one shard.
pub const DUPLICATE_MARKER: char = '*';

/// Value a log records for a read that found no value.
pub const NULL_VALUE: &str = "null";

/// The four raw fields of a log line, untrimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLine<'a> {
    pub timestamp: &'a str,
    pub thread: &'a str,
    pub kind: &'a str,
    pub payload: &'a str,
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Parse one log line recorded by `client_id`.
///
/// # Errors
///
/// - [`Error::MalformedLogLine`] if the line does not have four fields or the
///   payload does not match the operation kind.
/// - [`Error::UnknownOperationKind`] if the kind field is not a known keyword.
pub fn parse_line(line: &str, client_id: u64) -> Result<Operation, Error> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (duplicate, body) = match line.strip_prefix(DUPLICATE_MARKER) {
        Some(body) => (true, body),
        None => (false, line),
    };

    let raw = split_fields(body)?;
    let kind_text = raw.kind.trim();
    let kind = operation_kind(kind_text).ok_or_else(|| Error::UnknownOperationKind {
        kind: kind_text.to_string(),
    })?;

    Ok(Operation {
        timestamp: raw.timestamp.trim().to_string(),
        thread: raw.thread.trim().to_string(),
        client_id,
        duplicate,
        action: parse_action(kind, raw.payload.trim())?,
    })
}

/// Split a line into its four fields.
///
/// # Errors
///
/// Returns [`Error::MalformedLogLine`] if the line has fewer than four
/// fields.
pub fn split_fields(line: &str) -> Result<RawLine<'_>, Error> {
    let mut input = line;
    let (timestamp, thread, kind, payload) = (field, field, field, rest)
        .parse_next(&mut input)
        .map_err(|_| Error::malformed("expected `timestamp, thread, kind, payload`"))?;
    Ok(RawLine {
        timestamp,
        thread,
        kind,
        payload,
    })
}

// ---------------------------------------------------------------------------
// Leaf parsers
// ---------------------------------------------------------------------------

/// Everything up to the next separator, which is consumed.
fn field<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    terminated(take_until(0.., SEPARATOR), SEPARATOR).parse_next(input)
}

/// A signed decimal version.
fn version(input: &mut &str) -> ModalResult<Version> {
    dec_int.map(Version).parse_next(input)
}

/// `text` parsed as a whole version, surrounding spaces allowed.
fn whole_version(text: &str) -> Option<Version> {
    let mut input = text.trim();
    let parsed = version.parse_next(&mut input).ok()?;
    input.is_empty().then_some(parsed)
}

/// Split a trailing `,version` off `payload`. The last comma only starts a
/// version if what follows is an integer; otherwise it belongs to the value.
fn split_version(payload: &str) -> (&str, Option<Version>) {
    payload
        .rsplit_once(',')
        .and_then(|(head, tail)| whole_version(tail).map(|v| (head, Some(v))))
        .unwrap_or((payload, None))
}

/// `map:key`, split at the first colon.
fn key(text: &str) -> Result<Key, Error> {
    let mut input = text.trim();
    let map_id = terminated(take_until(1.., ':'), ':')
        .parse_next(&mut input)
        .map_err(|_: winnow::error::ErrMode<winnow::error::ContextError>| {
            Error::malformed(format!("expected `map:key`, found `{text}`"))
        })?;
    if input.is_empty() {
        return Err(Error::malformed(format!("missing key id in `{text}`")));
    }
    Ok(Key::new(map_id.trim(), input.trim()))
}

/// `map:key=value`, split at the first `=`.
fn key_value(text: &str) -> Result<(Key, String), Error> {
    let (key_text, value) = text
        .split_once('=')
        .ok_or_else(|| Error::malformed(format!("expected `map:key=value`, found `{text}`")))?;
    Ok((key(key_text)?, value.trim().to_string()))
}

fn observed_value(value: String) -> Option<String> {
    (value != NULL_VALUE).then_some(value)
}

fn phase(text: &str) -> Result<TxPhase, Error> {
    match text.trim() {
        "start" => Ok(TxPhase::Start),
        "end" => Ok(TxPhase::End),
        "aborted" => Ok(TxPhase::Aborted),
        other => Err(Error::malformed(format!("unknown transaction phase `{other}`"))),
    }
}

fn transaction_marker(isolation: IsolationKind, payload: &str) -> Result<Action, Error> {
    let (phase_text, version) = split_version(payload);
    Ok(Action::Transaction {
        isolation,
        phase: phase(phase_text)?,
        version,
    })
}

// ---------------------------------------------------------------------------
// Payload parser
// ---------------------------------------------------------------------------

/// Parse the payload of an operation of the given kind.
///
/// # Errors
///
/// Returns [`Error::MalformedLogLine`] if the payload does not match `kind`.
pub fn parse_action(kind: TokenKind, payload: &str) -> Result<Action, Error> {
    let action = match kind {
        TokenKind::Read | TokenKind::TxRead => {
            let (body, version) = split_version(payload);
            let (key, value) = key_value(body)?;
            let observed = observed_value(value);
            if kind == TokenKind::Read {
                Action::Read {
                    key,
                    observed,
                    version,
                }
            } else {
                Action::TxRead {
                    key,
                    observed,
                    version,
                }
            }
        }
        TokenKind::Write | TokenKind::TxWrite => {
            let (body, version) = split_version(payload);
            let (key, value) = key_value(body)?;
            if kind == TokenKind::Write {
                Action::Write {
                    key,
                    value,
                    version,
                }
            } else {
                Action::TxWrite {
                    key,
                    value,
                    version,
                }
            }
        }
        TokenKind::Remove | TokenKind::TxRemove => {
            let (body, version) = split_version(payload);
            let key = key(body)?;
            if kind == TokenKind::Remove {
                Action::Remove { key, version }
            } else {
                Action::TxRemove { key, version }
            }
        }
        TokenKind::Version => Action::Version(
            whole_version(payload)
                .ok_or_else(|| Error::malformed(format!("expected a version, found `{payload}`")))?,
        ),
        TokenKind::Liveness => Action::Liveness {
            success: payload.rsplit(',').next().map(str::trim) == Some("Success"),
        },
        TokenKind::TxSnap => transaction_marker(IsolationKind::Snapshot, payload)?,
        TokenKind::TxOpt => transaction_marker(IsolationKind::Optimistic, payload)?,
        TokenKind::TxNest => transaction_marker(IsolationKind::Nested, payload)?,
        TokenKind::TxAwa => transaction_marker(IsolationKind::AlwaysWinsAborts, payload)?,
    };
    Ok(action)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Operation {
        parse_line(line, 3).expect("should parse")
    }

    #[test]
    fn test_plain_write() {
        let operation = parse("2017-09-12_12:20:40.447, [pool-1-thread-2], Write, m1:k1=v1\n");
        assert_eq!(operation.timestamp, "2017-09-12_12:20:40.447");
        assert_eq!(operation.thread, "[pool-1-thread-2]");
        assert_eq!(operation.client_id, 3);
        assert!(!operation.duplicate);
        assert_eq!(
            operation.action,
            Action::Write {
                key: Key::new("m1", "k1"),
                value: "v1".into(),
                version: None,
            }
        );
    }

    #[test]
    fn test_null_read_and_version_suffix() {
        assert_eq!(
            parse("t1, th1, Read, m1:k1=null").action,
            Action::Read {
                key: Key::new("m1", "k1"),
                observed: None,
                version: None,
            }
        );
        assert_eq!(
            parse("t1, tx-1, TxRead, m1:k1=v2,7").action,
            Action::TxRead {
                key: Key::new("m1", "k1"),
                observed: Some("v2".into()),
                version: Some(Version(7)),
            }
        );
    }

    #[test]
    fn test_payload_keeps_separators() {
        // Only the first three separators split fields.
        assert_eq!(
            parse("t1, th1, Write, m1:k1=a, b").action,
            Action::Write {
                key: Key::new("m1", "k1"),
                value: "a, b".into(),
                version: None,
            }
        );
        assert_eq!(
            parse("t1, th1, Write, m1:k1=a,b,12").action,
            Action::Write {
                key: Key::new("m1", "k1"),
                value: "a,b".into(),
                version: Some(Version(12)),
            }
        );
    }

    #[test]
    fn test_removes() {
        assert_eq!(
            parse("t1, th1, Rm, m1:k1").action,
            Action::Remove {
                key: Key::new("m1", "k1"),
                version: None,
            }
        );
        assert_eq!(
            parse("t1, tx-1, TxRm, m2:k9,4").action,
            Action::TxRemove {
                key: Key::new("m2", "k9"),
                version: Some(Version(4)),
            }
        );
    }

    #[test]
    fn test_transaction_markers() {
        assert_eq!(
            parse("t1, tx-1, TxSnap, start").action,
            Action::Transaction {
                isolation: IsolationKind::Snapshot,
                phase: TxPhase::Start,
                version: None,
            }
        );
        assert_eq!(
            parse("t1, tx-1, TxOpt, end, 12").action,
            Action::Transaction {
                isolation: IsolationKind::Optimistic,
                phase: TxPhase::End,
                version: Some(Version(12)),
            }
        );
        assert_eq!(
            parse("t1, tx-1, TxAWA, aborted").action,
            Action::Transaction {
                isolation: IsolationKind::AlwaysWinsAborts,
                phase: TxPhase::Aborted,
                version: None,
            }
        );
    }

    #[test]
    fn test_version_and_liveness() {
        assert_eq!(parse("t1, th1, Version, 42").action, Action::Version(Version(42)));
        assert_eq!(parse("t1, th1, Version, -1").action, Action::Version(Version::INITIAL));
        assert_eq!(
            parse("t1, main, Liveness, Success").action,
            Action::Liveness { success: true }
        );
        assert_eq!(
            parse("t1, main, Liveness, stuck 30s, Fail").action,
            Action::Liveness { success: false }
        );
    }

    #[test]
    fn test_duplicate_marker() {
        let operation = parse("*t1, tx-1, TxSnap, start");
        assert!(operation.duplicate);
        assert_eq!(operation.timestamp, "t1");
    }

    #[test]
    fn test_split_fields() {
        assert_eq!(
            split_fields("t1, th1, Read, m1:k1=v, x"),
            Ok(RawLine {
                timestamp: "t1",
                thread: "th1",
                kind: "Read",
                payload: "m1:k1=v, x",
            })
        );
    }

    #[test]
    fn test_malformed_lines() {
        for line in [
            "",
            "t1, th1, Read",
            "t1 th1 Read m1:k1=v",
            "t1, th1, Read, m1k1=v",
            "t1, th1, Write, m1:k1",
            "t1, th1, Rm, :k1",
            "t1, th1, Rm, m1:",
            "t1, th1, Version, five",
            "t1, tx-1, TxSnap, begin",
        ] {
            assert!(
                matches!(parse_line(line, 0), Err(Error::MalformedLogLine { .. })),
                "{line}"
            );
        }
    }

    #[test]
    fn test_unknown_kind() {
        assert_eq!(
            parse_line("t1, th1, Frobnicate, m1:k1=v", 0),
            Err(Error::UnknownOperationKind {
                kind: "Frobnicate".into()
            })
        );
    }
}
