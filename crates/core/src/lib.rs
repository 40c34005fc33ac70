//! Post-hoc consistency verification for key-value store operation logs.
//!
//! A load generator exercising the store records, per client, every plain
//! read/write/remove, every transactional read/write/remove, transaction
//! lifecycle markers and the store-assigned versions it observed. `kvoracle_core`
//! replays those operations into a [`GlobalRunState`], which reconstructs a
//! versioned history of every key, and then checks that every recorded read is
//! explained by that history (or by the enclosing transaction's own writes).
//!
//! Verification is a two-phase batch:
//!
//! 1. **Replay** -- every [`Operation`] is applied to the run state in log
//!    order. Writes and removes append to the key's history, transactional
//!    writes are buffered until commit, and reads are queued.
//! 2. **Verify** -- once every log has been replayed, each queued read is
//!    compared with the value visible at its version. Mismatches are
//!    reported as [`ReadInconsistency`] values through an
//!    [`InconsistencySink`].
//!
//! Reads are deferred because a read may be explained by a write recorded in
//! another client's log that is replayed later.
//!
//! ```rust,ignore
//! use kvoracle_core::{GlobalRunState, ReadInconsistency};
//!
//! let mut state = GlobalRunState::default();
//! for operation in &operations {
//!     operation.replay(&mut state)?;
//! }
//! let mut inconsistencies: Vec<ReadInconsistency> = Vec::new();
//! let incorrect = state.verify(&mut inconsistencies)?;
//! ```
//!
//! # Crate features
//!
//! - **`serde`** -- enables `Serialize`/`Deserialize` derives on the model and
//!   report types.
//! - **`schemars`** -- enables `JsonSchema` derives on the report types.
//!
//! This crate is `no_std` compatible (requires `alloc`). Log-line parsing lives
//! in the separate `kvoracle_parser` crate.

#![cfg_attr(not(any(test, feature = "schemars")), no_std)]
extern crate alloc;

pub mod error;
pub mod history;
pub mod operation;
pub mod report;
pub mod shard;
pub mod state;
pub mod transaction;
pub mod types;
pub mod verify;

pub use error::Error;
pub use operation::{Action, Operation};
pub use report::{ClientReport, CorrectnessReport, Verdict};
pub use state::GlobalRunState;
pub use verify::{InconsistencySink, ReadInconsistency};
