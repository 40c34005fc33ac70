//! Splitting client logs into independent per-map shards.
//!
//! Very long runs build histories too large to verify in one
//! [`GlobalRunState`](crate::GlobalRunState). Since no operation reads or writes
//! more than one key, the logs can be partitioned by map and every partition
//! verified on its own; the resulting reports are combined with
//! [`CorrectnessReport::merge`](crate::CorrectnessReport::merge).
//!
//! Lines that belong to more than one shard (transaction markers, version
//! markers) are copied into each of them. Every copy after the first is marked
//! with a leading `*` so that per-client operation counts stay exact after the
//! merge.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::error::Error;
use crate::types::{ClientId, Key, Version};

/// A raw log line handed to a [`ShardRouter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutedLine<'a> {
    /// The line without its duplication marker.
    pub text: &'a str,
    /// The line is already a copy and must stay marked.
    pub duplicate: bool,
}

/// Destination of [`Operation::dispatch`](crate::Operation::dispatch).
pub trait ShardRouter {
    /// A plain read, write or remove by `thread`.
    fn write_operation(&mut self, client_id: ClientId, thread: &str, key: &Key, line: RoutedLine<'_>);

    /// A read, write or remove inside transaction `tx_id`, presenting
    /// `version` if the line carries one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionVersionMismatch`] if the transaction was
    /// already pinned at another version. Shards pin independently, so a
    /// conflict across maps is only visible here.
    fn write_transaction_operation(
        &mut self,
        client_id: ClientId,
        tx_id: &str,
        key: &Key,
        version: Option<Version>,
        line: RoutedLine<'_>,
    ) -> Result<(), Error>;

    /// A transaction `start` marker.
    fn add_transaction(&mut self, client_id: ClientId, tx_id: &str, line: RoutedLine<'_>);

    /// A transaction `end` or `aborted` marker.
    fn finish_transaction(&mut self, client_id: ClientId, tx_id: &str, line: RoutedLine<'_>);

    /// A version marker of `thread`.
    fn update_latest_version(
        &mut self,
        client_id: ClientId,
        thread: &str,
        version: Version,
        line: RoutedLine<'_>,
    );

    /// The client's liveness line.
    fn liveness_report(&mut self, client_id: ClientId, line: RoutedLine<'_>);
}

/// The lines of one shard, grouped by client in replay order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Shard {
    /// `None` for the control shard, which holds liveness lines and
    /// transactions that touched no key.
    pub map_id: Option<String>,
    pub clients: BTreeMap<ClientId, Vec<String>>,
}

#[derive(Debug)]
struct OpenTransaction {
    start_line: String,
    start_duplicate: bool,
    shards: Vec<Option<String>>,
    pinned: Option<Version>,
}

/// [`ShardRouter`] that partitions lines by map id.
///
/// - Plain and transactional key operations go to their map's shard.
/// - A transaction's `start` line is emitted into a shard just before the
///   transaction's first operation there; its `end`/`aborted` line goes to
///   every shard it touched.
/// - A thread's latest version line is re-emitted into a shard before that
///   thread's next line there, unless the shard already has it.
/// - Liveness lines and transactions without key operations go to the
///   control shard.
#[derive(Debug, Default)]
pub struct MapShardRouter {
    shards: BTreeMap<Option<String>, BTreeMap<ClientId, Vec<String>>>,
    latest_versions: HashMap<(ClientId, String), (Version, String)>,
    synced_versions: HashMap<(Option<String>, ClientId, String), String>,
    open_transactions: HashMap<(ClientId, String), OpenTransaction>,
}

impl MapShardRouter {
    fn emit(&mut self, shard: &Option<String>, client_id: ClientId, text: &str, duplicate: bool) {
        let line = if duplicate {
            let mut marked = String::with_capacity(text.len() + 1);
            marked.push('*');
            marked.push_str(text);
            marked
        } else {
            text.to_string()
        };
        self.shards
            .entry(shard.clone())
            .or_default()
            .entry(client_id)
            .or_default()
            .push(line);
    }

    /// Emit `thread`'s latest version line into `shard` unless it is already
    /// there.
    fn sync_version(&mut self, shard: &Option<String>, client_id: ClientId, thread: &str) {
        let Some((_, latest)) = self.latest_versions.get(&(client_id, thread.to_string())) else {
            return;
        };
        let synced_key = (shard.clone(), client_id, thread.to_string());
        if self.synced_versions.get(&synced_key) == Some(latest) {
            return;
        }
        let latest = latest.clone();
        self.emit(shard, client_id, &latest, false);
        self.synced_versions.insert(synced_key, latest);
    }

    /// Make sure the open transaction `tx_id` has its start line in `shard`.
    fn enter_transaction(&mut self, shard: &Option<String>, client_id: ClientId, tx_id: &str) {
        let Some(open) = self
            .open_transactions
            .get_mut(&(client_id, tx_id.to_string()))
        else {
            return;
        };
        if open.shards.contains(shard) {
            return;
        }
        let duplicate = open.start_duplicate || !open.shards.is_empty();
        open.shards.push(shard.clone());
        let start_line = open.start_line.clone();
        self.sync_version(shard, client_id, tx_id);
        self.emit(shard, client_id, &start_line, duplicate);
    }

    /// Finish routing and return the shards, control shard first.
    ///
    /// Transactions still open without a key operation are started in the
    /// control shard.
    #[must_use]
    pub fn into_shards(mut self) -> Vec<Shard> {
        let mut unfinished: Vec<_> = self
            .open_transactions
            .drain()
            .filter(|(_, open)| open.shards.is_empty())
            .collect();
        unfinished.sort_by(|(left, _), (right, _)| left.cmp(right));
        for ((client_id, _), open) in unfinished {
            self.emit(&None, client_id, &open.start_line, open.start_duplicate);
        }

        self.shards
            .into_iter()
            .map(|(map_id, clients)| Shard { map_id, clients })
            .collect()
    }
}

impl ShardRouter for MapShardRouter {
    fn write_operation(&mut self, client_id: ClientId, thread: &str, key: &Key, line: RoutedLine<'_>) {
        let shard = Some(key.map_id.clone());
        self.sync_version(&shard, client_id, thread);
        self.emit(&shard, client_id, line.text, line.duplicate);
    }

    fn write_transaction_operation(
        &mut self,
        client_id: ClientId,
        tx_id: &str,
        key: &Key,
        version: Option<Version>,
        line: RoutedLine<'_>,
    ) -> Result<(), Error> {
        let tx_key = (client_id, tx_id.to_string());
        let presented = version.unwrap_or_else(|| {
            self.latest_versions
                .get(&tx_key)
                .map_or(Version::INITIAL, |(latest, _)| *latest)
        });
        if let Some(open) = self.open_transactions.get_mut(&tx_key) {
            match open.pinned {
                None => open.pinned = Some(presented),
                Some(pinned) if pinned != presented => {
                    return Err(Error::TransactionVersionMismatch {
                        tx_id: tx_id.to_string(),
                        pinned,
                        presented,
                    });
                }
                Some(_) => {}
            }
        }

        let shard = Some(key.map_id.clone());
        self.enter_transaction(&shard, client_id, tx_id);
        self.sync_version(&shard, client_id, tx_id);
        self.emit(&shard, client_id, line.text, line.duplicate);
        Ok(())
    }

    fn add_transaction(&mut self, client_id: ClientId, tx_id: &str, line: RoutedLine<'_>) {
        self.open_transactions.insert(
            (client_id, tx_id.to_string()),
            OpenTransaction {
                start_line: line.text.to_string(),
                start_duplicate: line.duplicate,
                shards: Vec::new(),
                pinned: None,
            },
        );
    }

    fn finish_transaction(&mut self, client_id: ClientId, tx_id: &str, line: RoutedLine<'_>) {
        let shards = match self.open_transactions.remove(&(client_id, tx_id.to_string())) {
            Some(open) if open.shards.is_empty() => {
                self.emit(&None, client_id, &open.start_line, open.start_duplicate);
                alloc::vec![None]
            }
            Some(open) => open.shards,
            None => alloc::vec![None],
        };
        for (i, shard) in shards.iter().enumerate() {
            self.sync_version(shard, client_id, tx_id);
            self.emit(shard, client_id, line.text, line.duplicate || i > 0);
        }
    }

    fn update_latest_version(
        &mut self,
        client_id: ClientId,
        thread: &str,
        version: Version,
        line: RoutedLine<'_>,
    ) {
        self.latest_versions
            .insert((client_id, thread.to_string()), (version, line.text.to_string()));
    }

    fn liveness_report(&mut self, client_id: ClientId, line: RoutedLine<'_>) {
        self.emit(&None, client_id, line.text, line.duplicate);
    }
}
