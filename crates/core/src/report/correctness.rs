use alloc::collections::BTreeMap;
use alloc::string::String;
use core::fmt::{Display, Formatter, Result};

use super::{ClientReport, MergeError};
use crate::state::GlobalRunState;
use crate::types::ClientId;

/// Outcome of a verification run.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "schemars", derive(::schemars::JsonSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Display for Verdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::Pass => f.write_str("Pass"),
            Self::Fail => f.write_str("Fail"),
        }
    }
}

/// Aggregate of a whole run or of a set of merged shards.
///
/// Only counters are stored; the verdict and the percentages are derived on
/// demand so that merged reports never carry stale values.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "schemars", derive(::schemars::JsonSchema))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectnessReport {
    pub map_count: u64,
    /// Distinct key ids of the busiest map.
    pub key_count: u64,
    pub inconsistency_count: u64,
    pub checkpoint_count: u64,
    pub client_reports: BTreeMap<ClientId, ClientReport>,
    /// Exceptions seen in the exception logs, by name. `None` when no
    /// exception log was scanned.
    pub exception_counts: Option<BTreeMap<String, u64>>,
}

impl CorrectnessReport {
    /// Build the report of a verified run.
    #[must_use]
    pub fn new(state: &GlobalRunState, client_reports: BTreeMap<ClientId, ClientReport>) -> Self {
        let checkpoint_count = client_reports
            .values()
            .map(|report| report.checkpoint_count)
            .sum();
        Self {
            map_count: state.map_count(),
            key_count: state.key_count(),
            inconsistency_count: state.incorrect_read_count(),
            checkpoint_count,
            client_reports,
            exception_counts: None,
        }
    }

    #[must_use]
    pub fn with_exception_counts(mut self, exception_counts: BTreeMap<String, u64>) -> Self {
        self.exception_counts = Some(exception_counts);
        self
    }

    /// Reads issued by all clients.
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.client_reports.values().map(ClientReport::read_count).sum()
    }

    /// Key operations issued by all clients.
    #[must_use]
    pub fn operation_count(&self) -> u64 {
        self.client_reports
            .values()
            .map(ClientReport::operation_count)
            .sum()
    }

    /// Share of reads that were inconsistent, in percent. Zero for a run
    /// without reads.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn inconsistency_percentage(&self) -> f64 {
        match self.read_count() {
            0 => 0.0,
            reads => self.inconsistency_count as f64 / reads as f64 * 100.0,
        }
    }

    #[must_use]
    pub const fn correctness_success(&self) -> bool {
        self.inconsistency_count == 0
    }

    /// All clients reported liveness, and the run made progress at all.
    #[must_use]
    pub fn liveness_success(&self) -> bool {
        if self.operation_count() == 0 && self.map_count == 0 && self.key_count == 0 {
            return false;
        }
        self.client_reports
            .values()
            .all(|report| report.liveness_success)
    }

    #[must_use]
    pub fn status(&self) -> Verdict {
        if self.correctness_success() && self.liveness_success() {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    /// Combine the reports of two independent shards.
    ///
    /// Counts are summed, except `key_count` which keeps the larger value
    /// since shards partition maps rather than key ids. Client reports with
    /// the same id are merged, all others are carried over.
    ///
    /// # Errors
    ///
    /// Never fails for well-formed reports; [`MergeError`] is propagated from
    /// [`ClientReport::merge`].
    pub fn merge(mut self, other: &Self) -> core::result::Result<Self, MergeError> {
        self.map_count += other.map_count;
        self.key_count = self.key_count.max(other.key_count);
        self.inconsistency_count += other.inconsistency_count;
        self.checkpoint_count += other.checkpoint_count;

        for (client_id, report) in &other.client_reports {
            let merged = match self.client_reports.remove(client_id) {
                Some(own) => own.merge(report)?,
                None => report.clone(),
            };
            self.client_reports.insert(*client_id, merged);
        }

        self.exception_counts = match (self.exception_counts.take(), &other.exception_counts) {
            (None, None) => None,
            (own, theirs) => {
                let mut counts = own.unwrap_or_default();
                for (name, count) in theirs.iter().flatten() {
                    *counts.entry(name.clone()).or_default() += count;
                }
                Some(counts)
            }
        };
        Ok(self)
    }
}

impl Display for CorrectnessReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "Scenario report")?;
        writeln!(f, "Correctness success: {}", self.correctness_success())?;
        writeln!(f, "Liveness success: {}", self.liveness_success())?;
        writeln!(f, "Number of maps: {}", self.map_count)?;
        writeln!(f, "Number of keys/map: {}", self.key_count)?;
        writeln!(f, "Number of operations: {}", self.operation_count())?;
        writeln!(f, "Number of Inconsistencies: {}", self.inconsistency_count)?;
        writeln!(
            f,
            "Inconsistency percentage: {:.2} %",
            self.inconsistency_percentage()
        )?;
        if let Some(exception_counts) = &self.exception_counts {
            writeln!(f, "Exceptions counts:")?;
            for (name, count) in exception_counts {
                writeln!(f, "  {name}: {count}")?;
            }
        }
        for report in self.client_reports.values() {
            write!(f, "{report}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;
    use crate::operation::{Action, Operation};
    use crate::types::Key;

    fn client(client_id: ClientId, reads: u64) -> ClientReport {
        let mut report = ClientReport::new(client_id);
        report.operations.reads = reads;
        report
    }

    fn report(map_count: u64, inconsistency_count: u64, clients: &[ClientReport]) -> CorrectnessReport {
        CorrectnessReport {
            map_count,
            key_count: 2,
            inconsistency_count,
            checkpoint_count: 0,
            client_reports: clients
                .iter()
                .map(|report| (report.client_id, report.clone()))
                .collect(),
            exception_counts: None,
        }
    }

    #[test]
    fn test_derived_fields() {
        let report = report(1, 1, &[client(0, 3), client(1, 1)]);
        assert_eq!(report.read_count(), 4);
        assert!((report.inconsistency_percentage() - 25.0).abs() < f64::EPSILON);
        assert!(!report.correctness_success());
        assert!(report.liveness_success());
        assert_eq!(report.status(), Verdict::Fail);
    }

    #[test]
    fn test_no_reads_means_zero_percentage() {
        let report = report(1, 0, &[client(0, 0)]);
        assert!(report.inconsistency_percentage().abs() < f64::EPSILON);
    }

    #[test]
    fn test_idle_run_fails_liveness() {
        let report = CorrectnessReport {
            client_reports: [(0, ClientReport::new(0))].into_iter().collect(),
            ..CorrectnessReport::default()
        };
        assert!(report.correctness_success());
        assert!(!report.liveness_success());
        assert_eq!(report.status(), Verdict::Fail);
    }

    #[test]
    fn test_report_from_state() {
        let mut state = GlobalRunState::default();
        let operation = Operation {
            timestamp: "t1".into(),
            thread: "th1".into(),
            client_id: 0,
            duplicate: false,
            action: Action::Write {
                key: Key::new("m1", "k1"),
                value: "v".into(),
                version: None,
            },
        };
        operation.replay(&mut state).unwrap();
        let mut client_report = ClientReport::new(0);
        client_report.record(&operation);

        let report = CorrectnessReport::new(&state, [(0, client_report)].into_iter().collect());
        assert_eq!(report.map_count, 1);
        assert_eq!(report.key_count, 1);
        assert_eq!(report.operation_count(), 1);
        assert_eq!(report.status(), Verdict::Pass);
    }

    #[test]
    fn test_merge_keeps_clients_of_both_sides() {
        let left = report(1, 1, &[client(0, 2)]);
        let right = report(2, 0, &[client(0, 1), client(1, 5)]);

        let merged = left.merge(&right).unwrap();
        assert_eq!(merged.map_count, 3);
        assert_eq!(merged.key_count, 2);
        assert_eq!(merged.inconsistency_count, 1);
        assert_eq!(merged.client_reports.len(), 2);
        assert_eq!(merged.client_reports[&0].operations.reads, 3);
        assert_eq!(merged.client_reports[&1].operations.reads, 5);
    }

    #[test]
    fn test_merge_is_associative() {
        let a = report(1, 1, &[client(0, 2)]);
        let b = report(1, 0, &[client(1, 4)]);
        let c = report(1, 2, &[client(0, 1), client(2, 1)])
            .with_exception_counts([("TrimmedException".to_string(), 2)].into_iter().collect());

        let left = a.clone().merge(&b).unwrap().merge(&c).unwrap();
        let right = a.merge(&b.merge(&c).unwrap()).unwrap();
        assert_eq!(left, right);
        assert_eq!(
            left.exception_counts.unwrap()["TrimmedException"],
            2
        );
    }

    #[test]
    fn test_display_scenario_section() {
        let report = report(1, 0, &[client(0, 1)])
            .with_exception_counts([("TimeoutException".to_string(), 3)].into_iter().collect());
        let text = report.to_string();
        assert!(text.starts_with(
            "Scenario report
Correctness success: true
Liveness success: true
Number of maps: 1
Number of keys/map: 2
Number of operations: 1
Number of Inconsistencies: 0
Inconsistency percentage: 0.00 %
Exceptions counts:
  TimeoutException: 3
Report for client 0
"
        ));
    }
}
