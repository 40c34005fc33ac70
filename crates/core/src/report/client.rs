use alloc::collections::BTreeMap;
use core::fmt::{Display, Formatter, Result};
use core::ops::AddAssign;

use super::MergeError;
use crate::operation::{Action, Operation};
use crate::types::{ClientId, IsolationKind, TxPhase};

const SEPARATOR: &str = "======================";

/// Started, committed and aborted transactions of one isolation kind.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "schemars", derive(::schemars::JsonSchema))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionCounts {
    pub started: u64,
    pub committed: u64,
    pub aborted: u64,
}

impl AddAssign for TransactionCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.started += rhs.started;
        self.committed += rhs.committed;
        self.aborted += rhs.aborted;
    }
}

/// Key operations by kind.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "schemars", derive(::schemars::JsonSchema))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationCounts {
    pub reads: u64,
    pub writes: u64,
    pub removes: u64,
    pub tx_reads: u64,
    pub tx_writes: u64,
    pub tx_removes: u64,
}

impl OperationCounts {
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.reads + self.writes + self.removes + self.tx_reads + self.tx_writes + self.tx_removes
    }
}

impl AddAssign for OperationCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.reads += rhs.reads;
        self.writes += rhs.writes;
        self.removes += rhs.removes;
        self.tx_reads += rhs.tx_reads;
        self.tx_writes += rhs.tx_writes;
        self.tx_removes += rhs.tx_removes;
    }
}

/// Counters of one client (one input log).
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "schemars", derive(::schemars::JsonSchema))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientReport {
    pub client_id: ClientId,
    /// Whether the client reported it was never permanently stuck. True
    /// until a liveness line says otherwise.
    pub liveness_success: bool,
    pub checkpoint_count: u64,
    pub transactions: BTreeMap<IsolationKind, TransactionCounts>,
    pub operations: OperationCounts,
}

impl ClientReport {
    #[must_use]
    pub const fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            liveness_success: true,
            checkpoint_count: 0,
            transactions: BTreeMap::new(),
            operations: OperationCounts {
                reads: 0,
                writes: 0,
                removes: 0,
                tx_reads: 0,
                tx_writes: 0,
                tx_removes: 0,
            },
        }
    }

    /// Count a replayed operation. Duplicated lines are ignored: they are
    /// copies of a line already counted in another shard.
    pub fn record(&mut self, operation: &Operation) {
        if operation.duplicate {
            return;
        }
        let counts = &mut self.operations;
        match &operation.action {
            Action::Read { .. } => counts.reads += 1,
            Action::Write { .. } => counts.writes += 1,
            Action::Remove { .. } => counts.removes += 1,
            Action::TxRead { .. } => counts.tx_reads += 1,
            Action::TxWrite { .. } => counts.tx_writes += 1,
            Action::TxRemove { .. } => counts.tx_removes += 1,
            Action::Transaction {
                isolation, phase, ..
            } => {
                let tx_counts = self.transactions.entry(*isolation).or_default();
                match phase {
                    TxPhase::Start => tx_counts.started += 1,
                    TxPhase::End => tx_counts.committed += 1,
                    TxPhase::Aborted => tx_counts.aborted += 1,
                }
            }
            Action::Liveness { success } => self.liveness_success = *success,
            Action::Version(_) => {}
        }
    }

    /// Transaction counters of `isolation`, zero if none were recorded.
    #[must_use]
    pub fn transaction_counts(&self, isolation: IsolationKind) -> TransactionCounts {
        self.transactions
            .get(&isolation)
            .copied()
            .unwrap_or_default()
    }

    /// Reads issued by this client, transactional or not.
    #[must_use]
    pub const fn read_count(&self) -> u64 {
        self.operations.reads + self.operations.tx_reads
    }

    #[must_use]
    pub const fn operation_count(&self) -> u64 {
        self.operations.total()
    }

    /// Sum two reports of the same client.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::ClientMismatch`] if the client ids differ.
    pub fn merge(mut self, other: &Self) -> core::result::Result<Self, MergeError> {
        if self.client_id != other.client_id {
            return Err(MergeError::ClientMismatch {
                left: self.client_id,
                right: other.client_id,
            });
        }
        self.liveness_success &= other.liveness_success;
        self.checkpoint_count += other.checkpoint_count;
        self.operations += other.operations;
        for (isolation, counts) in &other.transactions {
            *self.transactions.entry(*isolation).or_default() += *counts;
        }
        Ok(self)
    }
}

impl Display for ClientReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "Report for client {}", self.client_id)?;
        writeln!(f, "Liveness success: {}", self.liveness_success)?;
        writeln!(f, "Total number of operations: {}", self.operation_count())?;
        writeln!(f, "{SEPARATOR}")?;
        for isolation in IsolationKind::ALL {
            let counts = self.transaction_counts(isolation);
            writeln!(
                f,
                "Number of {} Transactions: {}",
                isolation.label(),
                counts.started
            )?;
            writeln!(f, "  Committed: {}", counts.committed)?;
            writeln!(f, "  Aborted: {}", counts.aborted)?;
            writeln!(f, "{SEPARATOR}")?;
        }
        let ops = &self.operations;
        writeln!(f, "Number of transactional")?;
        writeln!(f, "  Reads: {}", ops.tx_reads)?;
        writeln!(f, "  Writes: {}", ops.tx_writes)?;
        writeln!(f, "  Remove: {}", ops.tx_removes)?;
        writeln!(f, "{SEPARATOR}")?;
        writeln!(f, "Number of Non-transactional")?;
        writeln!(f, "  Reads: {}", ops.reads)?;
        writeln!(f, "  Writes: {}", ops.writes)?;
        writeln!(f, "  Remove: {}", ops.removes)?;
        writeln!(f, "{SEPARATOR}")
    }
}
