use std::{fs, process};

use clap::Parser;
use kvoracle_cli::{App, Command, DriverError, InconsistencyLog, ReportOutput, Verifier};
use kvoracle_core::CorrectnessReport;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app = App::parse();
    match &app.command {
        Command::Verify(args) => verify(args),
        Command::Generate(args) => generate(args),
        Command::Schema => schema(),
    }
}

fn verify(args: &kvoracle_cli::VerifyArgs) {
    let verifier = Verifier::builder()
        .logs(args.logs.clone())
        .exception_logs(args.exception_logs.clone())
        .shard_by_map(args.shard_by_map)
        .build();
    let mut sink = InconsistencyLog::new(&args.inconsistency_report);

    let report = verifier
        .verify(&mut sink)
        .and_then(|report| sink.flush().map(|()| report).map_err(DriverError::from))
        .unwrap_or_else(|e| {
            eprintln!("Verification failed: {e}");
            let code = if matches!(e, DriverError::MissingLog { .. }) { 2 } else { 1 };
            process::exit(code);
        });

    if sink.written() > 0 {
        eprintln!(
            "{} inconsistencies written to {}",
            sink.written(),
            sink.path().display()
        );
    }

    if args.json {
        let output = ReportOutput::from(&report);
        let json = serde_json::to_string(&output).unwrap_or_else(|e| {
            eprintln!("Failed to serialize report: {e}");
            process::exit(1);
        });
        println!("{json}");
    } else {
        println!("{report}");
    }

    exit_on_failure(&report);
}

fn exit_on_failure(report: &CorrectnessReport) {
    let mut failed = false;
    if !report.correctness_success() {
        eprintln!("Correctness error");
        failed = true;
    }
    if !report.liveness_success() {
        eprintln!("Liveness error");
        failed = true;
    }
    if failed {
        process::exit(1);
    }
}

fn generate(args: &kvoracle_cli::GenerateArgs) {
    let runs = kvoracle_testgen::generate_mult_runs(
        args.n_run,
        args.n_client,
        args.n_thread,
        args.n_map,
        args.n_key,
        args.n_operation,
    );

    for run in &runs {
        let run_dir = args.output_dir.join(format!("run-{}", run.get_id()));
        fs::create_dir_all(&run_dir).unwrap_or_else(|e| {
            eprintln!("Failed to create {}: {e}", run_dir.display());
            process::exit(1);
        });
        for (client, lines) in run.get_logs().iter().enumerate() {
            let path = run_dir.join(format!("client-{client}.log"));
            let mut text = lines.join("\n");
            text.push('\n');
            fs::write(&path, text).unwrap_or_else(|e| {
                eprintln!("Failed to write {}: {e}", path.display());
                process::exit(1);
            });
        }
    }

    println!(
        "Generated {} runs to {}",
        runs.len(),
        args.output_dir.display()
    );
}

fn schema() {
    let schema = schemars::schema_for!(CorrectnessReport);
    let json = serde_json::to_string_pretty(&schema).unwrap_or_else(|e| {
        eprintln!("Failed to serialize schema: {e}");
        process::exit(1);
    });
    println!("{json}");
}
