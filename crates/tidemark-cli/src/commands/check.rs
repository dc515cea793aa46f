use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use tidemark_engine::check_pipeline;

use super::load_and_init;

/// Execute the `check` command: validate configuration, the watermark store,
/// and staging database connectivity.
pub async fn execute(config_path: Option<&Path>, log_level: Option<&str>) -> Result<ExitCode> {
    let config = load_and_init(config_path, log_level)?;
    println!("Configuration:     OK");

    let result = check_pipeline(&config).await;

    match &result.watermark {
        Ok(Some(wm)) => println!("Watermark store:   OK (watermark {wm})"),
        Ok(None) => println!("Watermark store:   OK (no watermark; next run is a full load)"),
        Err(e) => println!("Watermark store:   FAILED\n  {e}"),
    }
    match &result.destination {
        Ok(columns) if columns.is_empty() => {
            println!("Staging database:  OK (table not created yet)");
        }
        Ok(columns) => println!("Staging database:  OK ({} column(s))", columns.len()),
        Err(e) => println!("Staging database:  FAILED\n  {e}"),
    }

    if result.is_ok() {
        println!("\nAll checks passed.");
        Ok(ExitCode::SUCCESS)
    } else {
        anyhow::bail!("One or more checks failed")
    }
}
