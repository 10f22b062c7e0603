//! prefixwalk CLI
//!
//! Walks S3-compatible buckets as directory trees and lists every object key.

use clap::Parser;
use pw_cli_common::{format_number, init_logging};
use pw_walker::{BucketOutcome, RunSummary};
use std::time::{Duration, Instant};

mod args;
mod progress;
mod run;

use args::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Logs go to stderr (or --log-file) so `--output -` stays clean
    init_logging(args.log_level, args.log_file.as_deref())?;

    let started = Instant::now();
    let summary = run::execute(args).await?;

    print_summary(&summary, started.elapsed());

    if summary.has_errors() {
        std::process::exit(4); // Partial failure
    }

    Ok(())
}

/// Report results to stderr.
fn print_summary(summary: &RunSummary, elapsed: Duration) {
    eprintln!();
    eprintln!("Walk completed:");
    eprintln!("  Buckets:        {}", summary.outcomes.len());
    eprintln!(
        "  Prefixes:       {}",
        format_number(summary.total_prefixes() as u64)
    );
    eprintln!(
        "  Keys emitted:   {}",
        format_number(summary.total_emitted() as u64)
    );
    eprintln!("  Errors:         {}", summary.total_errors());
    eprintln!("  Duration:       {:.2}s", elapsed.as_secs_f64());

    for (bucket, outcome) in &summary.outcomes {
        match outcome {
            BucketOutcome::Walked(stats) => eprintln!(
                "  {bucket}: {} keys, {} prefixes, {} excluded, {} cached, {} errors",
                format_number(stats.files_emitted as u64),
                format_number(stats.prefixes_listed as u64),
                format_number(stats.files_excluded as u64),
                format_number(stats.files_skipped as u64),
                stats.error_count()
            ),
            BucketOutcome::Skipped { reason } => eprintln!("  {bucket}: skipped ({reason})"),
        }
    }

    for (bucket, outcome) in &summary.outcomes {
        if let Some(stats) = outcome.stats() {
            for error in &stats.errors {
                eprintln!("  Error [{bucket}]: {error}");
            }
        }
    }
}
