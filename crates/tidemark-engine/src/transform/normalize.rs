//! Column-name canonicalisation and per-column type coercion.
//!
//! Both passes always run, names first, because coercion looks columns up
//! by their canonical name.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tidemark_types::timestamp::{format_canonical, parse_timestamp};
use tidemark_types::{Batch, Cell};

use super::schema::{expected_type, SemanticType, EXPECTED_COLUMNS, TIMESTAMP_COLUMNS};

/// Characters removed from column names.
const STRIPPED_CHARS: &[char] = &['?', '.'];

/// A whole column could not be coerced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoercionError {
    #[error("row {row} holds a nested {kind} value, not a {target:?} scalar")]
    Nested {
        row: usize,
        kind: &'static str,
        target: SemanticType,
    },
}

/// Column that kept its original cells because coercion failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionFailure {
    pub column: String,
    pub error: CoercionError,
}

/// What the coercion pass did to a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoercionReport {
    /// Columns converted to their declared type.
    pub coerced: Vec<String>,
    /// Columns left untouched.
    pub failed: Vec<CoercionFailure>,
    /// Schema columns the batch did not contain.
    pub missing_expected: Vec<String>,
    /// Individual values that became missing because they did not parse.
    pub values_nulled: usize,
}

/// Canonical form of one source column name.
#[must_use]
pub fn canonical_column_name(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Canonicalise every name, suffixing collisions with `_1`, `_2`, ... in
/// first-seen order.
#[must_use]
pub fn canonical_column_names(columns: &[String]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(columns.len());
    let mut collisions: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(columns.len());

    for original in columns {
        let base = canonical_column_name(original);
        if taken.insert(base.clone()) {
            out.push(base);
            continue;
        }

        let counter = collisions.entry(base.clone()).or_insert(0);
        let renamed = loop {
            *counter += 1;
            let candidate = format!("{base}_{counter}");
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        tracing::warn!(
            original = %original,
            canonical = %base,
            renamed = %renamed,
            "Duplicate column name after cleaning"
        );
        taken.insert(renamed.clone());
        out.push(renamed);
    }

    out
}

fn nested_kind(value: &Value) -> Option<&'static str> {
    match value {
        Value::Array(_) => Some("array"),
        Value::Object(_) => Some("object"),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
        .then_some(f as i64)
}

fn parse_int_text(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(integral))
}

fn parse_float_text(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

fn to_int(cell: &Cell) -> Option<i64> {
    match cell {
        Cell::Int(v) => Some(*v),
        Cell::Float(f) => integral(*f),
        Cell::Text(s) | Cell::Raw(Value::String(s)) => parse_int_text(s),
        Cell::Raw(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_float(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Int(v) => Some(*v as f64),
        Cell::Float(f) => Some(*f).filter(|f| f.is_finite()),
        Cell::Text(s) | Cell::Raw(Value::String(s)) => parse_float_text(s),
        Cell::Raw(Value::Number(n)) => n.as_f64(),
        _ => None,
    }
}

/// Coerce one column to `target`.
///
/// Unparseable scalars become [`Cell::Missing`]. Returns the coerced cells
/// and how many non-missing values were nulled.
///
/// # Errors
///
/// Returns [`CoercionError::Nested`] when a numeric column holds an object
/// or array; the caller should keep the original cells.
pub fn coerce_column(
    cells: &[Cell],
    target: SemanticType,
) -> Result<(Vec<Cell>, usize), CoercionError> {
    let mut nulled = 0usize;
    let mut out = Vec::with_capacity(cells.len());

    for (row, cell) in cells.iter().enumerate() {
        if cell.is_missing() {
            out.push(Cell::Missing);
            continue;
        }
        let coerced = match target {
            SemanticType::Text => match cell {
                Cell::Text(_) => cell.clone(),
                other => other
                    .as_text()
                    .map_or(Cell::Missing, |s| Cell::Text(s.into_owned())),
            },
            SemanticType::Integer | SemanticType::Float => {
                if let Cell::Raw(value) = cell {
                    if let Some(kind) = nested_kind(value) {
                        return Err(CoercionError::Nested { row, kind, target });
                    }
                }
                let parsed = if target == SemanticType::Integer {
                    to_int(cell).map(Cell::Int)
                } else {
                    to_float(cell).map(Cell::Float)
                };
                parsed.unwrap_or_else(|| {
                    nulled += 1;
                    Cell::Missing
                })
            }
        };
        out.push(coerced);
    }

    Ok((out, nulled))
}

/// Re-render timestamps in the canonical layout; unparseable values become missing.
#[must_use]
pub fn normalize_timestamps(cells: &[Cell]) -> (Vec<Cell>, usize) {
    let mut nulled = 0usize;
    let out = cells
        .iter()
        .map(|cell| match cell.as_text() {
            None => Cell::Missing,
            Some(text) => match parse_timestamp(&text) {
                Some(ts) => Cell::Text(format_canonical(&ts)),
                None => {
                    nulled += 1;
                    Cell::Missing
                }
            },
        })
        .collect();
    (out, nulled)
}

/// Rename columns, then coerce every schema column the batch contains.
#[must_use]
pub fn normalize(mut batch: Batch) -> (Batch, CoercionReport) {
    let names = canonical_column_names(batch.columns());
    batch.rename_columns(names);

    let mut report = CoercionReport::default();

    for idx in 0..batch.columns().len() {
        let column = batch.columns()[idx].clone();
        let Some(target) = expected_type(&column) else {
            continue;
        };
        let cells: Vec<Cell> = batch.column_cells(idx).cloned().collect();
        match coerce_column(&cells, target) {
            Ok((coerced, nulled)) => {
                if nulled > 0 {
                    tracing::debug!(column = %column, nulled, "Unparseable values set to missing");
                }
                report.values_nulled += nulled;
                batch.replace_column(idx, coerced);
                report.coerced.push(column);
            }
            Err(error) => {
                tracing::warn!(
                    column = %column,
                    target = ?target,
                    error = %error,
                    "Could not coerce column; leaving original values"
                );
                report.failed.push(CoercionFailure { column, error });
            }
        }
    }

    for &column in TIMESTAMP_COLUMNS {
        let Some(idx) = batch.column_index(column) else {
            continue;
        };
        let cells: Vec<Cell> = batch.column_cells(idx).cloned().collect();
        let (parsed, nulled) = normalize_timestamps(&cells);
        if nulled > 0 {
            tracing::warn!(column, nulled, "Unparseable timestamps set to missing");
        }
        report.values_nulled += nulled;
        batch.replace_column(idx, parsed);
    }

    for (column, _) in EXPECTED_COLUMNS {
        if batch.column_index(column).is_none() {
            report.missing_expected.push((*column).to_string());
        }
    }
    if !report.missing_expected.is_empty() {
        tracing::debug!(
            missing = ?report.missing_expected,
            "Expected columns absent from batch"
        );
    }

    tracing::info!(
        columns = batch.columns().len(),
        rows = batch.num_rows(),
        coerced = report.coerced.len(),
        failed = report.failed.len(),
        "Normalized batch"
    );
    (batch, report)
}
