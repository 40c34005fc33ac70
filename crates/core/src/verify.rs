//! The verification pass over queued reads.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::convert::Infallible;
use core::fmt::{Display, Formatter, Result as FmtResult};

use crate::history::{format_key_history, KeyState};
use crate::state::GlobalRunState;
use crate::types::{short_value, ClientId, Key, TxId, Value, Version};

const READ_AFTER_WRITE: &str = "read after write (value written in same tx)";
const READ_FROM_HISTORY: &str = "value read comes from other operation";

/// Where a queued read was issued.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadContext {
    /// Outside any transaction.
    Plain,
    /// Inside a transaction. `own_write` holds the value the transaction had
    /// itself written to the key before the read, if it had.
    Transactional {
        tx_id: TxId,
        own_write: Option<Option<Value>>,
    },
}

/// A replayed read waiting for the verification pass.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRead {
    pub key: Key,
    /// Value recorded in the log; `None` when the log says `null`.
    pub observed: Option<Value>,
    /// Version the read is checked at: the thread cursor for plain reads, the
    /// pinned snapshot for transactional ones.
    pub version: Version,
    pub client_id: ClientId,
    pub thread: String,
    pub timestamp: String,
    pub context: ReadContext,
}

impl PendingRead {
    /// The value this read should have returned, and whether it comes from
    /// the enclosing transaction's own write.
    #[must_use]
    pub fn expected<'a>(&'a self, state: &'a GlobalRunState) -> (Option<&'a str>, bool) {
        match &self.context {
            ReadContext::Transactional {
                own_write: Some(value),
                ..
            } => (value.as_deref(), true),
            _ => (
                state
                    .key_state(&self.key)
                    .and_then(|history| history.get_at_version(self.version)),
                false,
            ),
        }
    }

    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        matches!(self.context, ReadContext::Transactional { .. })
    }
}

/// A read whose observed value is not explained by the reconstructed history.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadInconsistency {
    pub key: Key,
    pub version: Version,
    pub client_id: ClientId,
    pub thread: String,
    pub timestamp: String,
    pub expected: Option<Value>,
    pub observed: Option<Value>,
    /// The expected value came from the reading transaction's own write.
    pub read_after_write: bool,
    pub in_transaction: bool,
    /// Rendered history of the key at verification time.
    pub history_table: String,
}

impl ReadInconsistency {
    fn new(
        read: &PendingRead,
        expected: Option<Value>,
        read_after_write: bool,
        history: Option<&KeyState>,
    ) -> Self {
        let history_table = history.map_or_else(
            || format_key_history(&KeyState::new(read.key.clone())),
            format_key_history,
        );
        Self {
            key: read.key.clone(),
            version: read.version,
            client_id: read.client_id,
            thread: read.thread.clone(),
            timestamp: read.timestamp.clone(),
            expected,
            observed: read.observed.clone(),
            read_after_write,
            in_transaction: read.in_transaction(),
            history_table,
        }
    }
}

fn short_or_null(value: Option<&str>) -> &str {
    value.map_or("null", short_value)
}

impl Display for ReadInconsistency {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let kind = if self.read_after_write {
            READ_AFTER_WRITE
        } else {
            READ_FROM_HISTORY
        };
        let scope = if self.in_transaction { "(tx)" } else { "(non-tx)" };
        writeln!(f)?;
        writeln!(f, "ReadInconsistency({kind}) {scope}")?;
        writeln!(f, "map: {}, key: {}", self.key.map_id, self.key.key_id)?;
        writeln!(
            f,
            "expected value: {}, read_value: {}",
            short_or_null(self.expected.as_deref()),
            short_or_null(self.observed.as_deref())
        )?;
        writeln!(f, "Version: {}", self.version)?;
        writeln!(f, "Timestamp: {}", self.timestamp)?;
        writeln!(f, "Thread: {}", self.thread)?;
        writeln!(f, "Client: {}", self.client_id)?;
        write!(f, "{}", self.history_table)
    }
}

/// Destination of the inconsistencies found by [`GlobalRunState::verify`].
pub trait InconsistencySink {
    type Error;

    /// Persist one inconsistency.
    ///
    /// # Errors
    ///
    /// Implementation specific; a failure stops the verification pass.
    fn record(&mut self, inconsistency: ReadInconsistency) -> Result<(), Self::Error>;
}

impl InconsistencySink for Vec<ReadInconsistency> {
    type Error = Infallible;

    fn record(&mut self, inconsistency: ReadInconsistency) -> Result<(), Self::Error> {
        self.push(inconsistency);
        Ok(())
    }
}

impl GlobalRunState {
    /// Check every queued read against the reconstructed history.
    ///
    /// The queue is consumed. Each mismatch increments the run's incorrect
    /// read count and is handed to `sink`. Key histories are never modified.
    /// Returns the run's incorrect read count.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `sink`; reads after the failing
    /// one are not checked.
    pub fn verify<S>(&mut self, sink: &mut S) -> Result<u64, S::Error>
    where
        S: InconsistencySink + ?Sized,
    {
        let pending = core::mem::take(&mut self.pending_reads);
        tracing::debug!(reads = pending.len(), "verifying queued reads");

        for read in &pending {
            let inconsistency = {
                let (expected, read_after_write) = read.expected(self);
                if expected == read.observed.as_deref() {
                    continue;
                }
                ReadInconsistency::new(
                    read,
                    expected.map(ToString::to_string),
                    read_after_write,
                    self.key_state(&read.key),
                )
            };
            self.incorrect_read_count += 1;
            tracing::debug!(
                key = %inconsistency.key,
                version = %inconsistency.version,
                client_id = inconsistency.client_id,
                "read inconsistency"
            );
            sink.record(inconsistency)?;
        }

        Ok(self.incorrect_read_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_read(observed: Option<&str>, version: i64) -> PendingRead {
        PendingRead {
            key: Key::new("m1", "k1"),
            observed: observed.map(ToString::to_string),
            version: Version(version),
            client_id: 0,
            thread: "th1".into(),
            timestamp: "t1".into(),
            context: ReadContext::Plain,
        }
    }

    #[test]
    fn test_matching_read_is_not_reported() {
        let mut state = GlobalRunState::default();
        state
            .get_or_create(&Key::new("m1", "k1"))
            .put(Some("v1".into()), Version(5), None, "th1", 0);
        state.enqueue_read(plain_read(Some("v1"), 5));
        state.enqueue_read(plain_read(None, 4));

        let mut found: Vec<ReadInconsistency> = Vec::new();
        assert_eq!(state.verify(&mut found), Ok(0));
        assert!(found.is_empty());
        assert!(state.pending_reads().is_empty());
    }

    #[test]
    fn test_mismatch_is_reported() {
        let mut state = GlobalRunState::default();
        state
            .get_or_create(&Key::new("m1", "k1"))
            .put(Some("RIGHT".into()), Version(5), None, "th1", 0);
        state.enqueue_read(plain_read(Some("WRONG"), 5));

        let mut found: Vec<ReadInconsistency> = Vec::new();
        assert_eq!(state.verify(&mut found), Ok(1));
        assert_eq!(state.incorrect_read_count(), 1);

        let inconsistency = &found[0];
        assert_eq!(inconsistency.expected.as_deref(), Some("RIGHT"));
        assert_eq!(inconsistency.observed.as_deref(), Some("WRONG"));
        assert!(!inconsistency.read_after_write);
        assert!(!inconsistency.in_transaction);
    }

    #[test]
    fn test_read_of_unknown_key_expects_no_value() {
        let mut state = GlobalRunState::default();
        state.enqueue_read(plain_read(Some("ghost"), 3));

        let mut found: Vec<ReadInconsistency> = Vec::new();
        assert_eq!(state.verify(&mut found), Ok(1));
        assert_eq!(found[0].expected, None);
        assert!(state.key_state(&Key::new("m1", "k1")).is_none());
        assert!(found[0].history_table.contains("Version"));
    }

    #[test]
    fn test_own_write_wins_over_history() {
        let mut state = GlobalRunState::default();
        state
            .get_or_create(&Key::new("m1", "k1"))
            .put(Some("global".into()), Version(1), None, "th1", 0);
        let mut read = plain_read(Some("mine"), 1);
        read.context = ReadContext::Transactional {
            tx_id: "tx-1".into(),
            own_write: Some(Some("mine".into())),
        };
        state.enqueue_read(read);

        let mut found: Vec<ReadInconsistency> = Vec::new();
        assert_eq!(state.verify(&mut found), Ok(0));
    }

    #[test]
    fn test_inconsistency_report_text() {
        let mut state = GlobalRunState::default();
        state
            .get_or_create(&Key::new("m1", "k1"))
            .put(Some("RIGHT".into()), Version(5), None, "th1", 0);
        state.enqueue_read(plain_read(Some("WRONG"), 5));

        let mut found: Vec<ReadInconsistency> = Vec::new();
        state.verify(&mut found).unwrap();
        let text = found[0].to_string();
        let expected_head = "
ReadInconsistency(value read comes from other operation) (non-tx)
map: m1, key: k1
expected value: GHT, read_value: ONG
Version: 5
Timestamp: t1
Thread: th1
Client: 0
";
        assert!(text.starts_with(expected_head), "{text}");
        assert!(text.ends_with(&found[0].history_table));
    }
}
