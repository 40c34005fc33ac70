use alloc::collections::BTreeSet;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::types::{short_thread_id, ClientId, Key, Value, Version};

/// Who wrote a history entry.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub client_id: ClientId,
    /// Thread name for plain writes, transaction id for committed writes.
    pub thread: String,
}

impl Origin {
    /// The `(client, short thread)` column this origin is rendered under.
    #[must_use]
    pub fn column(&self) -> (ClientId, String) {
        (self.client_id, short_thread_id(&self.thread).to_string())
    }
}

/// Versions of the transaction that produced a committed entry.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionSpan {
    /// Snapshot the transaction read from, if it ever pinned one.
    pub start: Option<Version>,
    /// Version the transaction committed at.
    pub end: Version,
}

/// One write or remove of a key.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHistoryEntry {
    pub version: Version,
    /// `None` records a remove.
    pub value: Option<Value>,
    pub origin: Origin,
    /// Set when the entry was materialized by a transaction commit.
    pub transaction: Option<TransactionSpan>,
}

impl KeyHistoryEntry {
    #[must_use]
    pub const fn from_transaction(&self) -> bool {
        self.transaction.is_some()
    }
}

/// History of a single key across the whole run.
///
/// Entries are kept sorted by version. Entries with equal versions keep their
/// insertion order, so the last write recorded for a version is the one a
/// reader at that version observes.
#[derive(Debug, Clone)]
pub struct KeyState {
    key: Key,
    history: Vec<KeyHistoryEntry>,
    writers: BTreeSet<(ClientId, String)>,
    oldest_active_hint: Option<Version>,
}

impl KeyState {
    #[must_use]
    pub const fn new(key: Key) -> Self {
        Self {
            key,
            history: Vec::new(),
            writers: BTreeSet::new(),
            oldest_active_hint: None,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &Key {
        &self.key
    }

    #[must_use]
    pub fn history(&self) -> &[KeyHistoryEntry] {
        &self.history
    }

    /// Distinct `(client, short thread)` identities that wrote this key, in
    /// column order.
    pub fn writers(&self) -> impl Iterator<Item = &(ClientId, String)> {
        self.writers.iter()
    }

    #[must_use]
    pub const fn oldest_active_hint(&self) -> Option<Version> {
        self.oldest_active_hint
    }

    /// Append a non-transactional write (`Some`) or remove (`None`).
    ///
    /// `oldest_active` is the start version of the longest-running live
    /// transaction when the write happened; it bounds a later
    /// [`KeyState::compact`].
    pub fn put(
        &mut self,
        value: Option<Value>,
        version: Version,
        oldest_active: Option<Version>,
        thread: &str,
        client_id: ClientId,
    ) {
        self.insert(
            KeyHistoryEntry {
                version,
                value,
                origin: Origin {
                    client_id,
                    thread: thread.to_string(),
                },
                transaction: None,
            },
            oldest_active,
        );
    }

    /// Append a write or remove materialized by a transaction commit.
    #[allow(clippy::too_many_arguments)]
    pub fn commit(
        &mut self,
        value: Option<Value>,
        commit_version: Version,
        oldest_active: Option<Version>,
        tx_start: Option<Version>,
        tx_end: Version,
        tx_id: &str,
        client_id: ClientId,
    ) {
        self.insert(
            KeyHistoryEntry {
                version: commit_version,
                value,
                origin: Origin {
                    client_id,
                    thread: tx_id.to_string(),
                },
                transaction: Some(TransactionSpan {
                    start: tx_start,
                    end: tx_end,
                }),
            },
            oldest_active,
        );
    }

    fn insert(&mut self, entry: KeyHistoryEntry, oldest_active: Option<Version>) {
        self.writers.insert(entry.origin.column());
        let at = self.history.partition_point(|e| e.version <= entry.version);
        self.history.insert(at, entry);
        if oldest_active.is_some() {
            self.oldest_active_hint = oldest_active;
        }
    }

    /// Value visible to a reader at `version`.
    ///
    /// That is the last entry with exactly `version` if there is one, otherwise
    /// the latest entry older than `version`. Returns `None` when the key was
    /// removed as of `version` or had not been written yet.
    #[must_use]
    pub fn get_at_version(&self, version: Version) -> Option<&str> {
        self.entry_at_version(version)
            .and_then(|entry| entry.value.as_deref())
    }

    /// The entry a reader at `version` observes, if any.
    #[must_use]
    pub fn entry_at_version(&self, version: Version) -> Option<&KeyHistoryEntry> {
        let visible = self.history.partition_point(|e| e.version <= version);
        visible.checked_sub(1).map(|i| &self.history[i])
    }

    /// Drop every entry that no reader at a version `>= bound` can observe.
    ///
    /// The newest entry at or below `bound` is kept, so
    /// `get_at_version(v)` is unchanged for every `v >= bound`.
    /// Returns the number of dropped entries.
    pub fn trim_before(&mut self, bound: Version) -> usize {
        let visible = self.history.partition_point(|e| e.version <= bound);
        let Some(keep_from) = visible.checked_sub(1) else {
            return 0;
        };
        self.history.drain(..keep_from);
        keep_from
    }

    /// Trim using the last oldest-active-transaction hint seen by a write.
    pub fn compact(&mut self) -> usize {
        self.oldest_active_hint
            .map_or(0, |bound| self.trim_before(bound))
    }
}
