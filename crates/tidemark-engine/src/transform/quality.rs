//! Data-quality gate run on a normalized batch before load.
//!
//! The gate never drops rows for failing a check. It mutates the batch in
//! two ways: key text is trimmed in place so the batch and the staging
//! primary key agree on identity, and duplicate keys are collapsed before a
//! single multi-row upsert can touch the batch.

use std::collections::{HashMap, HashSet};

use tidemark_types::{Batch, Cell, CheckStatus, CheckVerdict, QualityVerdict};

use super::schema::count_columns;
use crate::errors::PipelineError;

pub const KEY_COMPLETENESS: &str = "KEY_COMPLETENESS";
pub const KEY_UNIQUENESS: &str = "KEY_UNIQUENESS";
pub const NON_NEGATIVE_COUNTS: &str = "NON_NEGATIVE_COUNTS";

/// Gate output: the batch to load and the verdict that decides whether to load it.
#[derive(Debug, Clone)]
pub struct GateReport {
    pub batch: Batch,
    pub verdict: QualityVerdict,
    pub duplicates_removed: usize,
    pub missing_keys: usize,
}

fn key_of(cell: &Cell) -> Option<String> {
    cell.as_text()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Key cell with surrounding whitespace removed. Blank keys are left as
/// they are and counted as missing.
fn trimmed_key(cell: &Cell) -> Cell {
    match cell {
        Cell::Text(s) if !s.trim().is_empty() && s.trim().len() != s.len() => {
            Cell::Text(s.trim().to_string())
        }
        other => other.clone(),
    }
}

/// Run every check against `batch`.
///
/// # Errors
///
/// Returns [`PipelineError::MissingKeyColumn`] when the key column is not in
/// the batch at all. Every other problem is reported in the verdict.
pub fn run_quality_gate(
    batch: Batch,
    key_column: &str,
    incremental_column: &str,
) -> Result<GateReport, PipelineError> {
    if batch.is_empty() {
        tracing::info!("Batch is empty; skipping data-quality checks");
        return Ok(GateReport {
            batch,
            verdict: QualityVerdict::new(),
            duplicates_removed: 0,
            missing_keys: 0,
        });
    }

    let Some(key_idx) = batch.column_index(key_column) else {
        tracing::error!(column = key_column, "Critical key column not found");
        return Err(PipelineError::MissingKeyColumn(key_column.to_string()));
    };

    let mut batch = batch;
    let trimmed: Vec<Cell> = batch.column_cells(key_idx).map(trimmed_key).collect();
    batch.replace_column(key_idx, trimmed);

    let mut verdict = QualityVerdict::new();

    let keys: Vec<Option<String>> = batch.column_cells(key_idx).map(key_of).collect();
    let missing_keys = keys.iter().filter(|k| k.is_none()).count();
    verdict.push(check_key_completeness(key_column, missing_keys));

    let before = batch.num_rows();
    let batch = resolve_duplicates(batch, &keys, incremental_column);
    let duplicates_removed = before - batch.num_rows();
    verdict.push(if duplicates_removed > 0 {
        tracing::warn!(
            column = key_column,
            duplicates_removed,
            "Duplicate keys within batch resolved"
        );
        CheckVerdict::new(
            KEY_UNIQUENESS,
            CheckStatus::Warn,
            format!("{duplicates_removed} duplicate '{key_column}' row(s) collapsed"),
        )
    } else {
        tracing::info!(column = key_column, "No duplicate keys within batch");
        CheckVerdict::new(KEY_UNIQUENESS, CheckStatus::Pass, "keys unique")
    });

    verdict.push(check_non_negative_counts(&batch));

    if verdict.should_halt() {
        tracing::warn!(tags = ?verdict.tags(), "Data-quality gate failed");
    } else {
        tracing::info!(tags = ?verdict.tags(), "Data-quality gate passed");
    }

    Ok(GateReport {
        batch,
        verdict,
        duplicates_removed,
        missing_keys,
    })
}

fn check_key_completeness(key_column: &str, missing: usize) -> CheckVerdict {
    if missing > 0 {
        tracing::warn!(column = key_column, missing, "Rows with missing key");
        CheckVerdict::new(
            KEY_COMPLETENESS,
            CheckStatus::Fail,
            format!("{missing} row(s) with missing '{key_column}'"),
        )
    } else {
        tracing::info!(column = key_column, "No missing keys");
        CheckVerdict::new(KEY_COMPLETENESS, CheckStatus::Pass, "no missing keys")
    }
}

/// Collapse rows sharing a key.
///
/// With the incremental column present, rows are stably sorted by it
/// (missing values first) and the last row per key wins. Without it the
/// first row per key wins and order is kept. Rows without a key are never
/// collapsed. A batch with no duplicates is returned untouched.
fn resolve_duplicates(batch: Batch, keys: &[Option<String>], incremental_column: &str) -> Batch {
    let mut seen = HashSet::with_capacity(keys.len());
    let has_duplicates = keys.iter().flatten().any(|k| !seen.insert(k));
    if !has_duplicates {
        return batch;
    }

    let mut order: Vec<usize> = (0..batch.num_rows()).collect();
    let keep: Vec<bool> = if let Some(ts_idx) = batch.column_index(incremental_column) {
        let rows = batch.rows();
        order.sort_by(|&a, &b| rows[a][ts_idx].as_text().cmp(&rows[b][ts_idx].as_text()));

        let mut last_pos: HashMap<&str, usize> = HashMap::new();
        for (pos, &row) in order.iter().enumerate() {
            if let Some(k) = &keys[row] {
                last_pos.insert(k.as_str(), pos);
            }
        }
        order
            .iter()
            .enumerate()
            .map(|(pos, &row)| keys[row].as_deref().map_or(true, |k| last_pos[k] == pos))
            .collect()
    } else {
        tracing::debug!(
            column = incremental_column,
            "Incremental column absent; keeping first occurrence per key"
        );
        let mut first_seen = HashSet::new();
        order
            .iter()
            .map(|&row| keys[row].as_deref().map_or(true, |k| first_seen.insert(k)))
            .collect()
    };

    let (columns, rows) = batch.into_parts();
    let mut slots: Vec<Option<Vec<Cell>>> = rows.into_iter().map(Some).collect();
    let resolved = order
        .iter()
        .zip(keep)
        .filter(|(_, keep)| *keep)
        .filter_map(|(&row, _)| slots[row].take())
        .collect();
    Batch::new(columns, resolved)
}

fn check_non_negative_counts(batch: &Batch) -> CheckVerdict {
    let mut offenders = Vec::new();
    for column in count_columns() {
        let Some(idx) = batch.column_index(column) else {
            continue;
        };
        let negatives = batch
            .column_cells(idx)
            .filter(|c| matches!(c, Cell::Int(v) if *v < 0))
            .count();
        if negatives > 0 {
            offenders.push(format!("{column} ({negatives})"));
        }
    }

    if offenders.is_empty() {
        CheckVerdict::new(NON_NEGATIVE_COUNTS, CheckStatus::Pass, "all counts non-negative")
    } else {
        tracing::warn!(columns = ?offenders, "Negative values in count columns");
        CheckVerdict::new(
            NON_NEGATIVE_COUNTS,
            CheckStatus::Warn,
            format!("negative counts in {}", offenders.join(", ")),
        )
    }
}
