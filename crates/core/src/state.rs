use alloc::collections::{BTreeMap, BTreeSet, VecDeque};
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::error::Error;
use crate::history::KeyState;
use crate::transaction::{TransactionKey, TransactionState};
use crate::types::{ClientId, IsolationKind, Key, Version};
use crate::verify::PendingRead;

/// Everything reconstructed from the logs of one verification run.
///
/// Owns the history of every key, the live transactions, the per-thread
/// version cursors and the reads waiting to be verified. One instance per run;
/// independent shards use independent instances.
#[derive(Debug, Default)]
pub struct GlobalRunState {
    key_states: HashMap<Key, KeyState>,
    transactions: HashMap<TransactionKey, TransactionState>,
    /// Live transactions in start order; the front is the oldest one.
    start_order: VecDeque<TransactionKey>,
    thread_versions: HashMap<(ClientId, String), Version>,
    pub(crate) pending_reads: Vec<PendingRead>,
    pub(crate) read_count: u64,
    pub(crate) incorrect_read_count: u64,
    /// Key ids touched in every map.
    maps: BTreeMap<String, BTreeSet<String>>,
}

impl GlobalRunState {
    /// History of `key`, created empty on first touch.
    pub fn get_or_create(&mut self, key: &Key) -> &mut KeyState {
        self.touch(key);
        self.key_states
            .entry(key.clone())
            .or_insert_with(|| KeyState::new(key.clone()))
    }

    /// Record that `key` was used by the run without creating history for it.
    pub fn touch(&mut self, key: &Key) {
        if !self.maps.contains_key(&key.map_id) {
            self.maps.insert(key.map_id.clone(), BTreeSet::new());
        }
        if let Some(key_ids) = self.maps.get_mut(&key.map_id) {
            if !key_ids.contains(&key.key_id) {
                key_ids.insert(key.key_id.clone());
            }
        }
    }

    #[must_use]
    pub fn key_state(&self, key: &Key) -> Option<&KeyState> {
        self.key_states.get(key)
    }

    pub fn key_states(&self) -> impl Iterator<Item = &KeyState> {
        self.key_states.values()
    }

    /// Snapshot version of the longest-running live transaction.
    #[must_use]
    pub fn oldest_active_tx_version(&self) -> Option<Version> {
        self.start_order
            .front()
            .and_then(|key| self.transactions.get(key))
            .and_then(TransactionState::snapshot_version)
    }

    /// Version of the last marker seen by `thread` of `client_id`.
    #[must_use]
    pub fn thread_latest_version(&self, client_id: ClientId, thread: &str) -> Version {
        self.thread_versions
            .get(&(client_id, thread.to_string()))
            .copied()
            .unwrap_or_default()
    }

    pub fn advance_thread_version(&mut self, client_id: ClientId, thread: &str, version: Version) {
        self.thread_versions
            .insert((client_id, thread.to_string()), version);
    }

    /// Register a new active transaction.
    ///
    /// A transaction id that is still live is replaced; its buffered writes are
    /// lost.
    pub fn start_tx(
        &mut self,
        client_id: ClientId,
        tx_id: &str,
        isolation: IsolationKind,
        start_version: Option<Version>,
    ) {
        let key = TransactionKey::new(client_id, tx_id);
        let tx = TransactionState::new(client_id, tx_id.to_string(), isolation, start_version);
        if self.transactions.insert(key.clone(), tx).is_some() {
            tracing::warn!(client_id, tx_id, "transaction restarted before it terminated");
            self.start_order.retain(|live| *live != key);
        }
        self.start_order.push_back(key);
    }

    /// The live transaction `tx_id` of `client_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingTransactionContext`] if no such transaction is
    /// live.
    pub fn transaction_mut(
        &mut self,
        client_id: ClientId,
        tx_id: &str,
    ) -> Result<&mut TransactionState, Error> {
        self.transactions
            .get_mut(&TransactionKey::new(client_id, tx_id))
            .ok_or_else(|| Error::MissingTransactionContext {
                client_id,
                tx_id: tx_id.to_string(),
            })
    }

    #[must_use]
    pub fn transaction(&self, client_id: ClientId, tx_id: &str) -> Option<&TransactionState> {
        self.transactions.get(&TransactionKey::new(client_id, tx_id))
    }

    #[must_use]
    pub fn live_transactions(&self) -> usize {
        self.transactions.len()
    }

    /// Commit the live transaction `tx_id` at `commit_version` and remove it
    /// from the registry. Returns the terminated transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingTransactionContext`] if no such transaction is
    /// live.
    pub fn commit_tx(
        &mut self,
        client_id: ClientId,
        tx_id: &str,
        commit_version: Version,
    ) -> Result<TransactionState, Error> {
        let mut tx = self.remove_tx(client_id, tx_id)?;
        tx.commit(self, commit_version);
        Ok(tx)
    }

    /// Abort the live transaction `tx_id` without touching any key history.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingTransactionContext`] if no such transaction is
    /// live.
    pub fn abort_tx(&mut self, client_id: ClientId, tx_id: &str) -> Result<TransactionState, Error> {
        let mut tx = self.remove_tx(client_id, tx_id)?;
        tx.abort();
        Ok(tx)
    }

    fn remove_tx(&mut self, client_id: ClientId, tx_id: &str) -> Result<TransactionState, Error> {
        let key = TransactionKey::new(client_id, tx_id);
        let tx = self
            .transactions
            .remove(&key)
            .ok_or_else(|| Error::MissingTransactionContext {
                client_id,
                tx_id: tx_id.to_string(),
            })?;
        // Terminated transactions leave the start order lazily from the front.
        while self
            .start_order
            .front()
            .is_some_and(|front| !self.transactions.contains_key(front))
        {
            self.start_order.pop_front();
        }
        Ok(tx)
    }

    /// Queue a read for the verification pass.
    pub fn enqueue_read(&mut self, read: PendingRead) {
        self.pending_reads.push(read);
    }

    #[must_use]
    pub fn pending_reads(&self) -> &[PendingRead] {
        &self.pending_reads
    }

    /// Count a replayed read, queued or not.
    pub fn count_read(&mut self) {
        self.read_count += 1;
    }

    #[must_use]
    pub const fn read_count(&self) -> u64 {
        self.read_count
    }

    #[must_use]
    pub const fn incorrect_read_count(&self) -> u64 {
        self.incorrect_read_count
    }

    /// Number of distinct map ids touched by the run.
    #[must_use]
    pub fn map_count(&self) -> u64 {
        self.maps.len() as u64
    }

    /// Keys per map: the number of distinct key ids in the busiest map.
    ///
    /// Maps are verified independently when sharding, so this is the only
    /// key count that shard reports can combine exactly.
    #[must_use]
    pub fn key_count(&self) -> u64 {
        self.maps
            .values()
            .map(|key_ids| key_ids.len() as u64)
            .max()
            .unwrap_or(0)
    }

    /// Trim every key history down to what its oldest-active-transaction hint
    /// still allows a reader to observe.
    ///
    /// Queued reads may need older entries, so this is only safe once the
    /// verification pass has consumed them. Returns the number of dropped
    /// entries.
    pub fn compact_histories(&mut self) -> usize {
        if !self.pending_reads.is_empty() {
            tracing::debug!(
                pending = self.pending_reads.len(),
                "skipping compaction with reads still queued"
            );
            return 0;
        }
        self.key_states.values_mut().map(KeyState::compact).sum()
    }
}
