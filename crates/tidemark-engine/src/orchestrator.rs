//! Pipeline orchestrator: reads the watermark, extracts, normalizes,
//! gates, loads, and advances the watermark after the load commits.

use std::time::Instant;

use tidemark_state::{FileWatermarkStore, SqliteWatermarkStore, StateError, WatermarkStore};
use tidemark_types::{Batch, PipelineId, Watermark};

use crate::checkpoint::{advance_watermark, max_watermark};
use crate::config::{PipelineConfig, StateBackendKind, StateConfig};
use crate::errors::PipelineError;
use crate::extract::{fetch_since, PageSource, SocrataClient};
use crate::load::{PostgresLoader, StagingSink};
use crate::result::{CheckResult, RunOutcome, RunReport};
use crate::transform::normalize::canonical_column_name;
use crate::transform::{normalize, run_quality_gate};

/// Open the configured watermark backend.
///
/// # Errors
///
/// Returns [`StateError`] if the `SQLite` database cannot be opened.
pub fn open_state_store(config: &StateConfig) -> Result<Box<dyn WatermarkStore>, StateError> {
    match config.backend {
        StateBackendKind::File => {
            let store = FileWatermarkStore::new(config.path.clone());
            tracing::debug!(path = %store.path().display(), "Using file watermark store");
            Ok(Box::new(store))
        }
        StateBackendKind::Sqlite => {
            tracing::debug!(path = %config.path.display(), "Using SQLite watermark store");
            Ok(Box::new(SqliteWatermarkStore::open(&config.path)?))
        }
    }
}

/// Run one sync against the production dataset API and staging database.
///
/// # Errors
///
/// Returns [`PipelineError`] on any unrecoverable failure. A quality-gate
/// halt is not an error; it is reported as [`RunOutcome::Halted`].
pub async fn run_pipeline(config: &PipelineConfig) -> Result<RunReport, PipelineError> {
    tracing::info!(pipeline = config.pipeline, "Starting pipeline run");

    let store = open_state_store(&config.state)?;
    let source = SocrataClient::from_config(&config.source)?;
    let mut loader = PostgresLoader::connect(&config.destination).await?;

    run_sync(config, &source, store.as_ref(), &mut loader).await
}

/// Drive one run through its stages. The sink is closed on every path.
///
/// # Errors
///
/// Returns [`PipelineError`] if the watermark cannot be read, extraction
/// fails, the key column is absent, or the load fails. The watermark is
/// never advanced on an error path.
pub async fn run_sync<S, K>(
    config: &PipelineConfig,
    source: &S,
    store: &dyn WatermarkStore,
    sink: &mut K,
) -> Result<RunReport, PipelineError>
where
    S: PageSource + ?Sized,
    K: StagingSink + ?Sized,
{
    let result = execute(config, source, store, sink).await;
    sink.close().await;

    match &result {
        Ok(report) => tracing::info!(
            pipeline = config.pipeline,
            outcome = %report.outcome,
            fetched = report.records_fetched,
            loaded = report.records_loaded,
            duration_secs = report.duration_secs,
            "Pipeline run finished"
        ),
        Err(e) => tracing::error!(pipeline = config.pipeline, error = %e, "Pipeline run failed"),
    }
    result
}

async fn execute<S, K>(
    config: &PipelineConfig,
    source: &S,
    store: &dyn WatermarkStore,
    sink: &mut K,
) -> Result<RunReport, PipelineError>
where
    S: PageSource + ?Sized,
    K: StagingSink + ?Sized,
{
    let start = Instant::now();
    let pipeline = PipelineId::new(config.pipeline.clone());

    let before = store.read(&pipeline)?;
    match &before {
        Some(wm) => tracing::info!(watermark = wm.as_str(), "Loaded watermark"),
        None => tracing::info!("No watermark stored; full load"),
    }
    let mut report = RunReport::new(before.clone());

    // Extract
    let extracted = fetch_since(source, &config.source, before.as_ref()).await?;
    report.records_fetched = extracted.records.len() as u64;
    report.pages_fetched = extracted.pages_fetched;
    report.truncated = extracted.truncated;

    if extracted.is_empty() {
        tracing::info!("No new data since last watermark");
        report.outcome = RunOutcome::NoNewData;
        report.duration_secs = start.elapsed().as_secs_f64();
        return Ok(report);
    }

    let candidate = max_watermark(&extracted.records, &config.source.incremental_column);
    if extracted.truncated {
        // Rows sharing the candidate timestamp beyond the cap are skipped next run.
        tracing::warn!(
            candidate = candidate.as_ref().map(Watermark::as_str),
            max_pages = config.source.max_pages,
            "Extraction truncated by page cap; advancing to the truncated batch's maximum"
        );
    }

    // Transform + validate
    let (batch, _coercion) = normalize(Batch::from_records(extracted.records));
    let gate = run_quality_gate(
        batch,
        &config.destination.unique_key,
        &canonical_column_name(&config.source.incremental_column),
    )?;
    report.duplicates_removed = gate.duplicates_removed as u64;
    report.missing_keys = gate.missing_keys as u64;
    report.verdict = gate.verdict;

    if report.verdict.should_halt() {
        tracing::warn!(
            tags = ?report.verdict.tags(),
            "Halting: data-quality gate failed; nothing loaded"
        );
        report.outcome = RunOutcome::Halted;
        report.duration_secs = start.elapsed().as_secs_f64();
        return Ok(report);
    }

    // Load
    let batch = gate.batch;
    sink.ensure_table(batch.columns()).await?;
    if batch.is_empty() {
        tracing::info!("Nothing left to load after validation");
        report.outcome = RunOutcome::NothingToLoad;
    } else {
        report.records_loaded = sink.upsert(&batch).await?;
        report.outcome = RunOutcome::Loaded;
    }

    // Advance, only after the load committed
    match candidate {
        Some(candidate) => {
            if advance_watermark(store, &pipeline, &candidate, before.as_ref()) {
                report.watermark_after = Some(candidate);
            }
        }
        None => tracing::warn!(
            column = config.source.incremental_column,
            "No parseable incremental values in batch; watermark unchanged"
        ),
    }

    report.duration_secs = start.elapsed().as_secs_f64();
    Ok(report)
}

/// Validate connectivity without extracting: read the watermark and
/// reach the staging database.
pub async fn check_pipeline(config: &PipelineConfig) -> CheckResult {
    tracing::info!(pipeline = config.pipeline, "Checking pipeline");
    let pipeline = PipelineId::new(config.pipeline.clone());

    let watermark = open_state_store(&config.state)
        .and_then(|store| store.read(&pipeline))
        .map_err(|e| e.to_string());

    let destination = match PostgresLoader::connect(&config.destination).await {
        Ok(mut loader) => {
            let columns = match loader.ping().await {
                Ok(()) => loader.table_columns().await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            loader.close().await;
            columns
        }
        Err(e) => Err(e.to_string()),
    };

    CheckResult {
        watermark,
        destination,
    }
}
