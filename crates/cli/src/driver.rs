//! End-to-end verification of a set of client logs.
//!
//! Log `i` of [`Verifier::logs`] is the log of client `i`. Every line is
//! parsed and replayed; lines that fail either step are logged with their
//! 1-based line number and skipped. After the last log, the queued reads are
//! verified and every inconsistency is written to the configured
//! [`InconsistencySink`].

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::{fs, io};

use derive_more::From;
use kvoracle_core::report::MergeError;
use kvoracle_core::shard::{MapShardRouter, Shard};
use kvoracle_core::types::ClientId;
use kvoracle_core::{
    ClientReport, CorrectnessReport, GlobalRunState, InconsistencySink, ReadInconsistency,
};
use kvoracle_parser::{parse_line, tally_exceptions};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use typed_builder::TypedBuilder;

#[derive(Debug, From)]
pub enum DriverError {
    /// An expected log file does not exist.
    #[from(skip)]
    MissingLog { path: PathBuf },
    Io(io::Error),
    Merge(MergeError),
}

impl Display for DriverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingLog { path } => write!(f, "log file {} does not exist", path.display()),
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Merge(err) => write!(f, "{err}"),
        }
    }
}

impl From<Infallible> for DriverError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MissingLog { .. } => None,
            Self::Io(err) => Some(err),
            Self::Merge(err) => Some(err),
        }
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct Verifier {
    /// One operation log per client, in client-id order.
    logs: Vec<PathBuf>,
    #[builder(default)]
    exception_logs: Vec<PathBuf>,
    /// Partition the logs by map and verify every map on its own.
    #[builder(default)]
    shard_by_map: bool,
}

fn read_log(path: &Path) -> Result<String, DriverError> {
    fs::read_to_string(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => DriverError::MissingLog {
            path: path.to_path_buf(),
        },
        _ => DriverError::Io(err),
    })
}

/// Non-blank lines of `text` with their 1-based line numbers.
fn numbered_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line))
        .filter(|(_, line)| !line.trim().is_empty())
}

const fn client_of(index: usize) -> ClientId {
    index as ClientId
}

impl Verifier {
    /// Verify the logs and report every inconsistency to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MissingLog`] if a log file does not exist, and
    /// [`DriverError::Io`] if a log cannot be read, and whatever `sink` fails
    /// with.
    pub fn verify<S>(&self, sink: &mut S) -> Result<CorrectnessReport, DriverError>
    where
        S: InconsistencySink + ?Sized,
        DriverError: From<S::Error>,
    {
        let texts = self
            .logs
            .iter()
            .map(|path| read_log(path))
            .collect::<Result<Vec<_>, _>>()?;

        let report = if self.shard_by_map {
            Self::verify_sharded(&texts, sink)?
        } else {
            Self::verify_single(&texts, sink)?
        };

        if self.exception_logs.is_empty() {
            return Ok(report);
        }
        let exception_texts = self
            .exception_logs
            .iter()
            .map(|path| read_log(path))
            .collect::<Result<Vec<_>, _>>()?;
        let counts = tally_exceptions(exception_texts.iter().flat_map(|text| text.lines()));
        Ok(report.with_exception_counts(counts))
    }

    fn verify_single<S>(texts: &[String], sink: &mut S) -> Result<CorrectnessReport, DriverError>
    where
        S: InconsistencySink + ?Sized,
        DriverError: From<S::Error>,
    {
        let mut state = GlobalRunState::default();
        let mut client_reports = BTreeMap::new();

        for (index, text) in texts.iter().enumerate() {
            let client_id = client_of(index);
            let mut report = ClientReport::new(client_id);
            for (line_number, line) in numbered_lines(text) {
                let replayed = parse_line(line, client_id)
                    .and_then(|operation| operation.replay(&mut state).map(|()| operation));
                match replayed {
                    Ok(operation) => report.record(&operation),
                    Err(err) => {
                        tracing::warn!(client_id, line_number, line, %err, "skipping log line");
                    }
                }
            }
            tracing::debug!(client_id, operations = report.operation_count(), "replayed log");
            client_reports.insert(client_id, report);
        }

        let incorrect = state.verify(sink)?;
        tracing::debug!(incorrect, reads = state.read_count(), "verified reads");
        Ok(CorrectnessReport::new(&state, client_reports))
    }

    fn verify_sharded<S>(texts: &[String], sink: &mut S) -> Result<CorrectnessReport, DriverError>
    where
        S: InconsistencySink + ?Sized,
        DriverError: From<S::Error>,
    {
        let mut router = MapShardRouter::default();
        for (index, text) in texts.iter().enumerate() {
            let client_id = client_of(index);
            for (line_number, line) in numbered_lines(text) {
                let routed = parse_line(line, client_id)
                    .and_then(|operation| operation.dispatch(&mut router, line));
                if let Err(err) = routed {
                    tracing::warn!(client_id, line_number, line, %err, "skipping log line");
                }
            }
        }

        let shards = router.into_shards();
        tracing::debug!(shards = shards.len(), "split logs by map");
        let verified: Vec<(CorrectnessReport, Vec<ReadInconsistency>)> =
            shards.into_par_iter().map(verify_shard).collect();

        // Clients whose every line was skipped still get a report.
        let mut merged = CorrectnessReport {
            client_reports: (0..texts.len())
                .map(|index| (client_of(index), ClientReport::new(client_of(index))))
                .collect(),
            ..CorrectnessReport::default()
        };
        for (report, inconsistencies) in verified {
            for inconsistency in inconsistencies {
                sink.record(inconsistency)?;
            }
            merged = merged.merge(&report)?;
        }
        Ok(merged)
    }
}

fn verify_shard(shard: Shard) -> (CorrectnessReport, Vec<ReadInconsistency>) {
    let map_id = shard.map_id.as_deref().unwrap_or("<control>");
    let mut state = GlobalRunState::default();
    let mut client_reports = BTreeMap::new();

    for (client_id, lines) in &shard.clients {
        let mut report = ClientReport::new(*client_id);
        for line in lines {
            let replayed = parse_line(line, *client_id)
                .and_then(|operation| operation.replay(&mut state).map(|()| operation));
            match replayed {
                Ok(operation) => report.record(&operation),
                Err(err) => {
                    tracing::warn!(map_id, client_id, line = line.as_str(), %err, "skipping log line");
                }
            }
        }
        client_reports.insert(*client_id, report);
    }

    let mut inconsistencies: Vec<ReadInconsistency> = Vec::new();
    match state.verify(&mut inconsistencies) {
        Ok(incorrect) => tracing::debug!(map_id, incorrect, "verified shard"),
        Err(never) => match never {},
    }
    (CorrectnessReport::new(&state, client_reports), inconsistencies)
}
