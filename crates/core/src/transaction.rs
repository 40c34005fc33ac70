//! State of one in-flight transaction.
//!
//! A transaction is `Active` from its `start` marker until its `end` (commit)
//! or `aborted` marker. Its writes are buffered locally and only reach the
//! global key histories on commit. The first read or write pins the snapshot
//! version every later operation of the transaction must present.

use alloc::string::String;

use hashbrown::HashMap;

use crate::error::Error;
use crate::state::GlobalRunState;
use crate::types::{ClientId, IsolationKind, Key, TxId, Value, Version};

#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Active,
    Committed,
    Aborted,
}

#[derive(Debug, Clone)]
pub struct TransactionState {
    tx_id: TxId,
    client_id: ClientId,
    isolation: IsolationKind,
    start_version: Option<Version>,
    pinned_version: Option<Version>,
    commit_version: Option<Version>,
    writes: HashMap<Key, Option<Value>>,
    status: TransactionStatus,
}

impl TransactionState {
    #[must_use]
    pub fn new(
        client_id: ClientId,
        tx_id: TxId,
        isolation: IsolationKind,
        start_version: Option<Version>,
    ) -> Self {
        Self {
            tx_id,
            client_id,
            isolation,
            start_version,
            pinned_version: None,
            commit_version: None,
            writes: HashMap::new(),
            status: TransactionStatus::Active,
        }
    }

    #[must_use]
    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    #[must_use]
    pub const fn client_id(&self) -> ClientId {
        self.client_id
    }

    #[must_use]
    pub const fn isolation(&self) -> IsolationKind {
        self.isolation
    }

    #[must_use]
    pub const fn start_version(&self) -> Option<Version> {
        self.start_version
    }

    #[must_use]
    pub const fn pinned_version(&self) -> Option<Version> {
        self.pinned_version
    }

    #[must_use]
    pub const fn commit_version(&self) -> Option<Version> {
        self.commit_version
    }

    #[must_use]
    pub const fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Version used to order this transaction among live ones: its snapshot
    /// once pinned, its start version before that.
    #[must_use]
    pub fn snapshot_version(&self) -> Option<Version> {
        self.pinned_version.or(self.start_version)
    }

    /// Pin the snapshot on first use and check every later use against it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionVersionMismatch`] when the transaction is
    /// already pinned at a different version.
    pub fn pin(&mut self, version: Version) -> Result<Version, Error> {
        match self.pinned_version {
            None => {
                self.pinned_version = Some(version);
                Ok(version)
            }
            Some(pinned) if pinned == version => Ok(pinned),
            Some(pinned) => Err(Error::TransactionVersionMismatch {
                tx_id: self.tx_id.clone(),
                pinned,
                presented: version,
            }),
        }
    }

    /// Buffer a write (`Some`) or remove (`None`) of `key`.
    pub fn buffer(&mut self, key: Key, value: Option<Value>) {
        self.writes.insert(key, value);
    }

    /// The value this transaction wrote to `key`, if it wrote it.
    ///
    /// The outer `Option` tells whether the key was written; the inner one is
    /// `None` for a buffered remove.
    #[must_use]
    pub fn buffered(&self, key: &Key) -> Option<Option<&str>> {
        self.writes.get(key).map(Option::as_deref)
    }

    #[must_use]
    pub fn write_set_len(&self) -> usize {
        self.writes.len()
    }

    /// Materialize every buffered write into the global key histories at
    /// `commit_version`.
    pub(crate) fn commit(&mut self, state: &mut GlobalRunState, commit_version: Version) {
        let oldest_active = state.oldest_active_tx_version();
        for (key, value) in self.writes.drain() {
            state.get_or_create(&key).commit(
                value,
                commit_version,
                oldest_active,
                self.pinned_version,
                commit_version,
                &self.tx_id,
                self.client_id,
            );
        }
        self.commit_version = Some(commit_version);
        self.status = TransactionStatus::Committed;
    }

    /// Discard the buffered writes.
    pub(crate) fn abort(&mut self) {
        self.writes.clear();
        self.status = TransactionStatus::Aborted;
    }
}

/// Identity of a transaction in the live registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionKey {
    pub client_id: ClientId,
    pub tx_id: String,
}

impl TransactionKey {
    #[must_use]
    pub fn new(client_id: ClientId, tx_id: &str) -> Self {
        Self {
            client_id,
            tx_id: tx_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx() -> TransactionState {
        TransactionState::new(0, "tx-1".into(), IsolationKind::Snapshot, Some(Version(3)))
    }

    #[test]
    fn test_pin_once() {
        let mut tx = tx();
        assert_eq!(tx.pinned_version(), None);
        assert_eq!(tx.snapshot_version(), Some(Version(3)));

        assert_eq!(tx.pin(Version(5)), Ok(Version(5)));
        assert_eq!(tx.pin(Version(5)), Ok(Version(5)));
        assert_eq!(tx.snapshot_version(), Some(Version(5)));
    }

    #[test]
    fn test_pin_mismatch_is_surfaced() {
        let mut tx = tx();
        tx.pin(Version(5)).unwrap();
        assert_eq!(
            tx.pin(Version(6)),
            Err(Error::TransactionVersionMismatch {
                tx_id: "tx-1".into(),
                pinned: Version(5),
                presented: Version(6),
            })
        );
        assert_eq!(tx.pinned_version(), Some(Version(5)));
    }

    #[test]
    fn test_buffered_reads_own_writes() {
        let mut tx = tx();
        let k1 = Key::new("m1", "k1");
        let k2 = Key::new("m1", "k2");
        assert_eq!(tx.buffered(&k1), None);

        tx.buffer(k1.clone(), Some("v1".into()));
        tx.buffer(k2.clone(), None);
        tx.buffer(k1.clone(), Some("v2".into()));

        assert_eq!(tx.buffered(&k1), Some(Some("v2")));
        assert_eq!(tx.buffered(&k2), Some(None));
        assert_eq!(tx.write_set_len(), 2);
    }

    #[test]
    fn test_abort_discards_writes() {
        let mut tx = tx();
        tx.buffer(Key::new("m1", "k1"), Some("v1".into()));
        tx.abort();
        assert_eq!(tx.status(), TransactionStatus::Aborted);
        assert_eq!(tx.write_set_len(), 0);
    }
}
