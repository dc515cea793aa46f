use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use tidemark_engine::{run_pipeline, RunOutcome, RunReport};

use super::{load_and_init, EXIT_HALTED};

/// Execute the `run` command: resolve configuration and run one sync.
pub async fn execute(config_path: Option<&Path>, log_level: Option<&str>) -> Result<ExitCode> {
    let config = load_and_init(config_path, log_level)?;

    tracing::info!(
        pipeline = config.pipeline,
        endpoint = config.source.resolved_endpoint(),
        table = config.destination.table,
        "Pipeline validated"
    );

    let report = run_pipeline(&config).await?;
    print_report(&config.pipeline, &report);

    if report.outcome == RunOutcome::Halted {
        Ok(ExitCode::from(EXIT_HALTED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_report(pipeline: &str, report: &RunReport) {
    println!("Pipeline '{pipeline}' finished: {}.", report.outcome);
    println!("  Records fetched: {} ({} page(s))", report.records_fetched, report.pages_fetched);
    println!("  Records loaded:  {}", report.records_loaded);
    if report.duplicates_removed > 0 {
        println!("  Duplicates:      {} collapsed", report.duplicates_removed);
    }
    if report.missing_keys > 0 {
        println!("  Missing keys:    {} row(s)", report.missing_keys);
    }
    if !report.verdict.is_empty() {
        println!("  Quality checks:  {}", report.verdict.tags().join(", "));
    }
    println!(
        "  Watermark:       {} -> {}",
        report
            .watermark_before
            .as_ref()
            .map_or("(none)", |w| w.as_str()),
        match &report.watermark_after {
            Some(w) => w.as_str(),
            None => "(unchanged)",
        }
    );
    if report.truncated {
        println!("  Truncated:       page cap reached; remaining rows follow next run");
    }
    println!("  Duration:        {:.2}s", report.duration_secs);
}
