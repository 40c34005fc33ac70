use alloc::string::String;
use core::fmt::{Display, Formatter, Result};

/// Index of the client (one per input log) that recorded an operation.
pub type ClientId = u64;

/// Thread name as written in the log. For transactional lines this field holds
/// the transaction id.
pub type ThreadId = String;

/// Transaction id. The load generator uses the thread field of transactional
/// lines as the transaction id.
pub type TxId = String;

/// Value stored under a key. Absent values (`None`) denote a removal or a key
/// that was never written.
pub type Value = String;

/// Logical timestamp assigned by the store under test.
///
/// Versions are monotonically non-decreasing per thread but not dense. A thread
/// that has not seen any version marker yet is at [`Version::INITIAL`].
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[cfg_attr(feature = "schemars", derive(::schemars::JsonSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(pub i64);

impl Version {
    /// Version of a thread before its first version marker.
    pub const INITIAL: Self = Self(-1);
}

impl Default for Version {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl From<i64> for Version {
    fn from(version: i64) -> Self {
        Self(version)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one logical cell: a key within a map.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "schemars", derive(::schemars::JsonSchema))]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    pub map_id: String,
    pub key_id: String,
}

impl Key {
    #[must_use]
    pub fn new(map_id: impl Into<String>, key_id: impl Into<String>) -> Self {
        Self {
            map_id: map_id.into(),
            key_id: key_id.into(),
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}:{}", self.map_id, self.key_id)
    }
}

/// Transaction flavor announced by a transaction lifecycle marker.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "schemars", derive(::schemars::JsonSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IsolationKind {
    /// `TxSnap`: snapshot isolation.
    Snapshot,
    /// `TxOpt`: optimistic concurrency.
    Optimistic,
    /// `TxNest`: nested transaction.
    Nested,
    /// `TxAWA`: always-wins-aborts transaction.
    AlwaysWinsAborts,
}

impl IsolationKind {
    pub const ALL: [Self; 4] = [
        Self::Snapshot,
        Self::Optimistic,
        Self::Nested,
        Self::AlwaysWinsAborts,
    ];

    /// The operation-kind token used for this flavor in the log.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Snapshot => "TxSnap",
            Self::Optimistic => "TxOpt",
            Self::Nested => "TxNest",
            Self::AlwaysWinsAborts => "TxAWA",
        }
    }

    /// Human-readable name used in printed reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Snapshot => "Snapshot",
            Self::Optimistic => "Optimistic",
            Self::Nested => "Nested",
            Self::AlwaysWinsAborts => "Always-Wins-Aborts",
        }
    }
}

/// Lifecycle phase announced by a transaction marker.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxPhase {
    /// `start`
    Start,
    /// `end`: the transaction committed.
    End,
    /// `aborted`
    Aborted,
}

/// Last component of a load-generator thread name.
///
/// `"[pool-1-thread-3]"` becomes `"3"`; names without dashes are returned up to
/// the first `]`.
#[must_use]
pub fn short_thread_id(thread: &str) -> &str {
    let last = thread.rsplit('-').next().unwrap_or(thread);
    last.split(']').next().unwrap_or(last)
}

/// The last three characters of a value, as shown in reports.
#[must_use]
pub fn short_value(value: &str) -> &str {
    value
        .char_indices()
        .rev()
        .nth(2)
        .map_or(value, |(start, _)| &value[start..])
}
