//! Typed log operations and their effect on the run state.

use alloc::string::{String, ToString};

use crate::error::Error;
use crate::shard::{RoutedLine, ShardRouter};
use crate::state::GlobalRunState;
use crate::types::{ClientId, IsolationKind, Key, TxPhase, Value, Version};
use crate::verify::{PendingRead, ReadContext};

/// What a log line records.
///
/// For transactional variants the operation's thread field is the
/// transaction id.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// `Read, map:key=value[,version]`
    Read {
        key: Key,
        observed: Option<Value>,
        version: Option<Version>,
    },
    /// `Write, map:key=value[,version]`
    Write {
        key: Key,
        value: Value,
        version: Option<Version>,
    },
    /// `Rm, map:key[,version]`
    Remove { key: Key, version: Option<Version> },
    /// `TxRead, map:key=value[,version]`
    TxRead {
        key: Key,
        observed: Option<Value>,
        version: Option<Version>,
    },
    /// `TxWrite, map:key=value[,version]`
    TxWrite {
        key: Key,
        value: Value,
        version: Option<Version>,
    },
    /// `TxRm, map:key[,version]`
    TxRemove { key: Key, version: Option<Version> },
    /// `TxSnap|TxOpt|TxNest|TxAWA, start|end|aborted[,version]`
    Transaction {
        isolation: IsolationKind,
        phase: TxPhase,
        version: Option<Version>,
    },
    /// `Version, version`
    Version(Version),
    /// `Liveness, Success|Fail`
    Liveness { success: bool },
}

impl Action {
    /// The key this action reads or writes, if any.
    #[must_use]
    pub const fn key(&self) -> Option<&Key> {
        match self {
            Self::Read { key, .. }
            | Self::Write { key, .. }
            | Self::Remove { key, .. }
            | Self::TxRead { key, .. }
            | Self::TxWrite { key, .. }
            | Self::TxRemove { key, .. } => Some(key),
            Self::Transaction { .. } | Self::Version(_) | Self::Liveness { .. } => None,
        }
    }
}

/// One parsed log line.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub timestamp: String,
    pub thread: String,
    pub client_id: ClientId,
    /// The line carried the `*` marker: it is a copy of a line already
    /// recorded elsewhere and must not be counted again.
    pub duplicate: bool,
    pub action: Action,
}

impl Operation {
    /// Apply this operation to the run state.
    ///
    /// Reads are queued for [`GlobalRunState::verify`] instead of being checked
    /// here.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingTransactionContext`] if a transactional operation or
    ///   a commit/abort marker names a transaction that is not live.
    /// - [`Error::TransactionVersionMismatch`] if a transactional read or
    ///   write presents a version other than its transaction's pinned one.
    pub fn replay(&self, state: &mut GlobalRunState) -> Result<(), Error> {
        let client_id = self.client_id;
        let thread = self.thread.as_str();
        match &self.action {
            Action::Read { key, observed, .. } => {
                let version = state.thread_latest_version(client_id, thread);
                state.touch(key);
                state.count_read();
                state.enqueue_read(self.pending_read(key, observed.clone(), version, ReadContext::Plain));
            }
            Action::Write { key, value, .. } => {
                self.put(state, key, Some(value.clone()));
            }
            Action::Remove { key, .. } => {
                self.put(state, key, None);
            }
            Action::TxRead {
                key,
                observed,
                version,
            } => {
                let presented = version.unwrap_or_else(|| state.thread_latest_version(client_id, thread));
                let tx = state.transaction_mut(client_id, thread)?;
                let pinned = tx.pin(presented)?;
                let own_write = tx.buffered(key).map(|value| value.map(ToString::to_string));
                state.touch(key);
                state.count_read();
                state.enqueue_read(self.pending_read(
                    key,
                    observed.clone(),
                    pinned,
                    ReadContext::Transactional {
                        tx_id: self.thread.clone(),
                        own_write,
                    },
                ));
            }
            Action::TxWrite {
                key,
                value,
                version,
            } => self.buffer(state, key, Some(value.clone()), *version)?,
            Action::TxRemove { key, version } => self.buffer(state, key, None, *version)?,
            Action::Transaction {
                isolation,
                phase,
                version,
            } => match phase {
                TxPhase::Start => state.start_tx(client_id, thread, *isolation, *version),
                TxPhase::End => {
                    let commit_version =
                        version.unwrap_or_else(|| state.thread_latest_version(client_id, thread));
                    state.commit_tx(client_id, thread, commit_version)?;
                }
                TxPhase::Aborted => {
                    state.abort_tx(client_id, thread)?;
                }
            },
            Action::Version(version) => state.advance_thread_version(client_id, thread, *version),
            Action::Liveness { .. } => {}
        }
        Ok(())
    }

    fn put(&self, state: &mut GlobalRunState, key: &Key, value: Option<Value>) {
        let version = state.thread_latest_version(self.client_id, &self.thread);
        let oldest_active = state.oldest_active_tx_version();
        state
            .get_or_create(key)
            .put(value, version, oldest_active, &self.thread, self.client_id);
    }

    fn buffer(
        &self,
        state: &mut GlobalRunState,
        key: &Key,
        value: Option<Value>,
        version: Option<Version>,
    ) -> Result<(), Error> {
        let presented =
            version.unwrap_or_else(|| state.thread_latest_version(self.client_id, &self.thread));
        let tx = state.transaction_mut(self.client_id, &self.thread)?;
        tx.pin(presented)?;
        tx.buffer(key.clone(), value);
        state.touch(key);
        Ok(())
    }

    fn pending_read(
        &self,
        key: &Key,
        observed: Option<Value>,
        version: Version,
        context: ReadContext,
    ) -> PendingRead {
        PendingRead {
            key: key.clone(),
            observed,
            version,
            client_id: self.client_id,
            thread: self.thread.clone(),
            timestamp: self.timestamp.clone(),
            context,
        }
    }

    /// Forward the raw line to a sharding router under this operation's
    /// routing key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionVersionMismatch`] if the router rejects a
    /// transactional operation; the line is not routed.
    pub fn dispatch<R>(&self, router: &mut R, raw_line: &str) -> Result<(), Error>
    where
        R: ShardRouter + ?Sized,
    {
        let line = RoutedLine {
            text: raw_line.strip_prefix('*').unwrap_or(raw_line),
            duplicate: self.duplicate,
        };
        let client_id = self.client_id;
        let thread = self.thread.as_str();
        match &self.action {
            Action::Read { key, .. } | Action::Write { key, .. } | Action::Remove { key, .. } => {
                router.write_operation(client_id, thread, key, line);
            }
            Action::TxRead { key, version, .. }
            | Action::TxWrite { key, version, .. }
            | Action::TxRemove { key, version } => {
                router.write_transaction_operation(client_id, thread, key, *version, line)?;
            }
            Action::Transaction {
                phase: TxPhase::Start,
                ..
            } => router.add_transaction(client_id, thread, line),
            Action::Transaction { .. } => router.finish_transaction(client_id, thread, line),
            Action::Version(version) => {
                router.update_latest_version(client_id, thread, *version, line);
            }
            Action::Liveness { .. } => router.liveness_report(client_id, line),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::verify::ReadInconsistency;

    fn op(thread: &str, action: Action) -> Operation {
        Operation {
            timestamp: "t1".into(),
            thread: thread.into(),
            client_id: 0,
            duplicate: false,
            action,
        }
    }

    fn replay_all(state: &mut GlobalRunState, operations: &[Operation]) {
        for operation in operations {
            operation.replay(state).unwrap();
        }
    }

    fn k1() -> Key {
        Key::new("m1", "k1")
    }

    #[test]
    fn test_write_uses_thread_version() {
        let mut state = GlobalRunState::default();
        replay_all(
            &mut state,
            &[
                op("th1", Action::Version(Version(5))),
                op(
                    "th1",
                    Action::Write {
                        key: k1(),
                        value: "v1".into(),
                        version: Some(Version(99)),
                    },
                ),
            ],
        );
        let history = state.key_state(&k1()).unwrap();
        assert_eq!(history.history()[0].version, Version(5));
    }

    #[test]
    fn test_remove_records_client() {
        let mut state = GlobalRunState::default();
        let mut remove = op("th1", Action::Remove { key: k1(), version: None });
        remove.client_id = 7;
        replay_all(&mut state, &[remove]);

        let entry = &state.key_state(&k1()).unwrap().history()[0];
        assert_eq!(entry.value, None);
        assert_eq!(entry.origin.client_id, 7);
    }

    #[test]
    fn test_transactional_read_pins_snapshot() {
        let mut state = GlobalRunState::default();
        replay_all(
            &mut state,
            &[
                op(
                    "tx-1",
                    Action::Transaction {
                        isolation: IsolationKind::Snapshot,
                        phase: TxPhase::Start,
                        version: Some(Version(2)),
                    },
                ),
                op(
                    "tx-1",
                    Action::TxRead {
                        key: k1(),
                        observed: None,
                        version: Some(Version(4)),
                    },
                ),
            ],
        );
        assert_eq!(
            state.transaction(0, "tx-1").unwrap().pinned_version(),
            Some(Version(4))
        );

        let mismatched = op(
            "tx-1",
            Action::TxWrite {
                key: k1(),
                value: "v".into(),
                version: Some(Version(6)),
            },
        );
        assert!(matches!(
            mismatched.replay(&mut state),
            Err(Error::TransactionVersionMismatch { .. })
        ));
    }

    #[test]
    fn test_transactional_operation_without_transaction() {
        let mut state = GlobalRunState::default();
        let read = op(
            "tx-9",
            Action::TxRead {
                key: k1(),
                observed: None,
                version: Some(Version(1)),
            },
        );
        assert_eq!(
            read.replay(&mut state),
            Err(Error::MissingTransactionContext {
                client_id: 0,
                tx_id: "tx-9".into()
            })
        );
        assert_eq!(state.read_count(), 0);
        assert!(state.pending_reads().is_empty());
    }

    #[test]
    fn test_commit_without_version_uses_cursor() {
        let mut state = GlobalRunState::default();
        replay_all(
            &mut state,
            &[
                op(
                    "tx-1",
                    Action::Transaction {
                        isolation: IsolationKind::Optimistic,
                        phase: TxPhase::Start,
                        version: None,
                    },
                ),
                op(
                    "tx-1",
                    Action::TxWrite {
                        key: k1(),
                        value: "v2".into(),
                        version: Some(Version(3)),
                    },
                ),
                op("tx-1", Action::Version(Version(8))),
                op(
                    "tx-1",
                    Action::Transaction {
                        isolation: IsolationKind::Optimistic,
                        phase: TxPhase::End,
                        version: None,
                    },
                ),
            ],
        );
        let history = state.key_state(&k1()).unwrap();
        assert_eq!(history.history()[0].version, Version(8));
        assert_eq!(history.get_at_version(Version(8)), Some("v2"));
    }

    #[test]
    fn test_liveness_is_a_no_op() {
        let mut state = GlobalRunState::default();
        replay_all(&mut state, &[op("main", Action::Liveness { success: false })]);
        assert_eq!(state.map_count(), 0);
        let mut found: Vec<ReadInconsistency> = Vec::new();
        assert_eq!(state.verify(&mut found), Ok(0));
    }
}
