use alloc::string::String;
use core::fmt::{Display, Formatter, Result};

use derive_more::From;

use crate::report::MergeError;
use crate::types::{ClientId, TxId, Version};

/// Failure to parse or apply a single log line.
///
/// Every variant is recoverable at run level: the driver logs the offending
/// line and continues with the next one.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, From)]
pub enum Error {
    /// The line does not have the `timestamp, thread, kind, payload` shape or
    /// its payload does not match the kind.
    #[from(skip)]
    MalformedLogLine { reason: String },
    /// The operation-kind field is not a recognized token.
    #[from(skip)]
    UnknownOperationKind { kind: String },
    /// A transactional operation presented a version that differs from the
    /// version its transaction was pinned to.
    #[from(skip)]
    TransactionVersionMismatch {
        tx_id: TxId,
        pinned: Version,
        presented: Version,
    },
    /// A transactional operation references a transaction that is not live.
    #[from(skip)]
    MissingTransactionContext { client_id: ClientId, tx_id: TxId },
    /// Two reports could not be combined.
    Merge(MergeError),
}

impl Error {
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedLogLine {
            reason: reason.into(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::MalformedLogLine { reason } => write!(f, "malformed log line: {reason}"),
            Self::UnknownOperationKind { kind } => write!(f, "unknown operation kind `{kind}`"),
            Self::TransactionVersionMismatch {
                tx_id,
                pinned,
                presented,
            } => write!(
                f,
                "transaction {tx_id} is pinned at version {pinned} but an operation presented version {presented}"
            ),
            Self::MissingTransactionContext { client_id, tx_id } => write!(
                f,
                "no live transaction {tx_id} for client {client_id}"
            ),
            Self::Merge(err) => write!(f, "{err}"),
        }
    }
}

impl core::error::Error for Error {}
