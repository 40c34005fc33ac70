#![allow(dead_code)]

use std::collections::BTreeMap;

use kvoracle_core::types::{IsolationKind, Key, TxPhase, Version};
use kvoracle_core::{
    Action, ClientReport, CorrectnessReport, GlobalRunState, Operation, ReadInconsistency,
};

/// Parse `"map:key"` into a [`Key`].
pub fn key(key_text: &str) -> Key {
    let (map_id, key_id) = key_text.split_once(':').unwrap();
    Key::new(map_id, key_id)
}

pub fn op(thread: &str, action: Action) -> Operation {
    Operation {
        timestamp: "t1".into(),
        thread: thread.into(),
        client_id: 0,
        duplicate: false,
        action,
    }
}

/// Reassign an operation to another client.
pub fn on(client_id: u64, mut operation: Operation) -> Operation {
    operation.client_id = client_id;
    operation
}

pub fn version(thread: &str, version: i64) -> Operation {
    op(thread, Action::Version(Version(version)))
}

pub fn write(thread: &str, key_text: &str, value: &str) -> Operation {
    op(
        thread,
        Action::Write {
            key: key(key_text),
            value: value.into(),
            version: None,
        },
    )
}

pub fn remove(thread: &str, key_text: &str) -> Operation {
    op(
        thread,
        Action::Remove {
            key: key(key_text),
            version: None,
        },
    )
}

/// Plain read; `None` stands for a logged `null`.
pub fn read(thread: &str, key_text: &str, observed: Option<&str>) -> Operation {
    op(
        thread,
        Action::Read {
            key: key(key_text),
            observed: observed.map(Into::into),
            version: None,
        },
    )
}

pub fn tx_start(tx_id: &str, isolation: IsolationKind) -> Operation {
    op(
        tx_id,
        Action::Transaction {
            isolation,
            phase: TxPhase::Start,
            version: None,
        },
    )
}

pub fn tx_end(tx_id: &str, isolation: IsolationKind, version: i64) -> Operation {
    op(
        tx_id,
        Action::Transaction {
            isolation,
            phase: TxPhase::End,
            version: Some(Version(version)),
        },
    )
}

pub fn tx_abort(tx_id: &str, isolation: IsolationKind) -> Operation {
    op(
        tx_id,
        Action::Transaction {
            isolation,
            phase: TxPhase::Aborted,
            version: None,
        },
    )
}

pub fn tx_write(tx_id: &str, key_text: &str, value: &str, version: i64) -> Operation {
    op(
        tx_id,
        Action::TxWrite {
            key: key(key_text),
            value: value.into(),
            version: Some(Version(version)),
        },
    )
}

pub fn tx_remove(tx_id: &str, key_text: &str, version: i64) -> Operation {
    op(
        tx_id,
        Action::TxRemove {
            key: key(key_text),
            version: Some(Version(version)),
        },
    )
}

pub fn tx_read(tx_id: &str, key_text: &str, observed: Option<&str>, version: i64) -> Operation {
    op(
        tx_id,
        Action::TxRead {
            key: key(key_text),
            observed: observed.map(Into::into),
            version: Some(Version(version)),
        },
    )
}

pub struct Outcome {
    pub state: GlobalRunState,
    pub report: CorrectnessReport,
    pub inconsistencies: Vec<ReadInconsistency>,
}

/// Replay `operations` in order, verify, and build the report the way the
/// driver does: failed lines are skipped and not counted.
pub fn run(operations: &[Operation]) -> Outcome {
    let mut state = GlobalRunState::default();
    let mut clients: BTreeMap<u64, ClientReport> = BTreeMap::new();
    for operation in operations {
        let client = clients
            .entry(operation.client_id)
            .or_insert_with(|| ClientReport::new(operation.client_id));
        if operation.replay(&mut state).is_ok() {
            client.record(operation);
        }
    }
    let mut inconsistencies: Vec<ReadInconsistency> = Vec::new();
    state.verify(&mut inconsistencies).unwrap();
    let report = CorrectnessReport::new(&state, clients);
    Outcome {
        state,
        report,
        inconsistencies,
    }
}
