//! kvoracle CLI -- verify key-value store operation logs and generate
//! synthetic ones.

pub mod driver;
pub mod inconsistency_log;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kvoracle_core::{CorrectnessReport, Verdict};
use serde::Serialize;

pub use driver::{DriverError, Verifier};
pub use inconsistency_log::InconsistencyLog;

/// Default operation log, as written by the load generator.
pub const DEFAULT_LOG: &str = "correctness.log";

/// Default destination of the inconsistency narratives.
pub const DEFAULT_INCONSISTENCY_REPORT: &str = "/tmp/inconsistencies_report";

#[derive(Debug, Parser)]
#[command(
    name = "kvoracle",
    about = "Post-hoc consistency verification for key-value store operation logs"
)]
pub struct App {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Verify operation logs, one per client
    Verify(VerifyArgs),
    /// Generate consistent synthetic operation logs
    Generate(GenerateArgs),
    /// Print the JSON Schema of the verification report to stdout
    Schema,
}

#[derive(Debug, Parser)]
pub struct VerifyArgs {
    /// Operation log of one client; repeat for every client
    #[arg(long = "log", default_value = DEFAULT_LOG)]
    pub logs: Vec<PathBuf>,
    /// Exception log whose exceptions are tallied in the report; repeatable
    #[arg(long = "exceptions")]
    pub exception_logs: Vec<PathBuf>,
    /// File the inconsistency narratives are written to
    #[arg(long, default_value = DEFAULT_INCONSISTENCY_REPORT)]
    pub inconsistency_report: PathBuf,
    /// Split the logs by map and verify every map independently
    #[arg(long)]
    pub shard_by_map: bool,
    /// Print the report as one JSON object
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct GenerateArgs {
    /// Number of runs to generate
    #[arg(long)]
    pub n_run: u64,
    /// Number of clients (one log per client)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub n_client: u64,
    /// Number of threads per client
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub n_thread: u64,
    /// Number of maps
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub n_map: u64,
    /// Number of keys per map
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub n_key: u64,
    /// Number of steps per run, across all clients
    #[arg(long)]
    pub n_operation: u64,
    /// Output directory; every run gets its own subdirectory
    #[arg(long)]
    pub output_dir: PathBuf,
}

/// JSON form of a verification report, with its derived fields.
#[derive(Debug, Serialize)]
pub struct ReportOutput<'a> {
    pub status: Verdict,
    pub correctness_success: bool,
    pub liveness_success: bool,
    pub inconsistency_percentage: f64,
    #[serde(flatten)]
    pub report: &'a CorrectnessReport,
}

impl<'a> From<&'a CorrectnessReport> for ReportOutput<'a> {
    fn from(report: &'a CorrectnessReport) -> Self {
        Self {
            status: report.status(),
            correctness_success: report.correctness_success(),
            liveness_success: report.liveness_success(),
            inconsistency_percentage: report.inconsistency_percentage(),
            report,
        }
    }
}
