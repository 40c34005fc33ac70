//! Per-client and whole-run counters, the final verdict and their merge
//! operators.
//!
//! Reports of independent shards are combined with
//! [`CorrectnessReport::merge`], which is associative so that shards can be
//! merged in any grouping.

pub mod client;
pub mod correctness;

use core::fmt::{Display, Formatter, Result};

pub use client::{ClientReport, OperationCounts, TransactionCounts};
pub use correctness::{CorrectnessReport, Verdict};

use crate::types::ClientId;

/// Two reports could not be combined.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// Client reports only merge with reports of the same client.
    ClientMismatch { left: ClientId, right: ClientId },
}

impl Display for MergeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::ClientMismatch { left, right } => write!(
                f,
                "cannot merge the report of client {left} with the report of client {right}"
            ),
        }
    }
}

impl core::error::Error for MergeError {}
