//! Synthetic load-generator logs for exercising the verifier.

pub mod generator;

pub use generator::{generate_mult_runs, generate_single_run, GeneratedRun, LogParams};
