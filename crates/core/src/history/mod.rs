//! Versioned per-key history.
//!
//! Every key touched by a run owns a [`KeyState`]: an append-only sequence of
//! [`KeyHistoryEntry`] kept sorted by version. Non-transactional writes and
//! removes land through [`KeyState::put`], committed transactional writes
//! through [`KeyState::commit`]. Reads never mutate history; they query
//! [`KeyState::get_at_version`].

pub mod display;
pub mod key_state;

pub use display::format_key_history;
pub use key_state::{KeyHistoryEntry, KeyState, Origin, TransactionSpan};
