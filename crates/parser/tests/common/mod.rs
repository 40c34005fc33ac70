#![allow(dead_code)]

use std::collections::BTreeMap;

use kvoracle_core::{ClientReport, CorrectnessReport, GlobalRunState, ReadInconsistency};
use kvoracle_parser::parse_line;

pub struct Verified {
    pub state: GlobalRunState,
    pub report: CorrectnessReport,
    pub inconsistencies: Vec<ReadInconsistency>,
    pub skipped: Vec<usize>,
}

/// Parse and replay every client log (one string per client), then verify.
/// Lines that fail to parse or replay are skipped and their numbers kept.
pub fn verify_logs(logs: &[&str]) -> Verified {
    let mut state = GlobalRunState::default();
    let mut clients = BTreeMap::new();
    let mut skipped = Vec::new();
    for (client_id, log) in (0u64..).zip(logs) {
        let client = clients
            .entry(client_id)
            .or_insert_with(|| ClientReport::new(client_id));
        for (line_number, line) in log.lines().enumerate() {
            match parse_line(line, client_id).and_then(|op| op.replay(&mut state).map(|()| op)) {
                Ok(operation) => client.record(&operation),
                Err(_) => skipped.push(line_number),
            }
        }
    }
    let mut inconsistencies: Vec<ReadInconsistency> = Vec::new();
    state.verify(&mut inconsistencies).unwrap();
    let report = CorrectnessReport::new(&state, clients);
    Verified {
        state,
        report,
        inconsistencies,
        skipped,
    }
}
