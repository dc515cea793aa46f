//! Multi-row `INSERT ... ON CONFLICT` merge path.
//!
//! Every value is bound as nullable text. Columns the table declares with
//! a non-text type get an explicit cast so the server converts the value.

use std::fmt::Write as _;

use pg_escape::quote_identifier;
use tidemark_types::{Batch, Cell};
use tokio_postgres::types::ToSql;
use tokio_postgres::Client;

use crate::errors::LoadError;

/// Maximum bind parameters in one statement (`PostgreSQL` wire limit).
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Maximum rows per multi-value INSERT statement.
const INSERT_CHUNK_SIZE: usize = 1000;

/// A batch column mapped onto an existing table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetColumn {
    /// Position in the batch.
    pub index: usize,
    pub name: String,
    /// SQL type to cast the bound text to, if the column is not textual.
    pub cast: Option<String>,
}

/// Cast needed to store text into a column of `data_type`.
fn cast_for(data_type: &str) -> Option<String> {
    let lower = data_type.to_ascii_lowercase();
    match lower.as_str() {
        "text" | "character varying" | "character" => None,
        // Composite and array types cannot be named from data_type alone.
        "user-defined" | "array" => None,
        other => Some(other.to_string()),
    }
}

/// Result of intersecting the batch columns with the table columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub targets: Vec<TargetColumn>,
    /// Batch columns the table does not have.
    pub dropped: Vec<String>,
}

/// Keep batch columns that exist in the table, in batch order.
#[must_use]
pub fn project_columns(batch_columns: &[String], table_columns: &[(String, String)]) -> Projection {
    let mut targets = Vec::new();
    let mut dropped = Vec::new();
    for (index, name) in batch_columns.iter().enumerate() {
        match table_columns.iter().find(|(col, _)| col == name) {
            Some((_, data_type)) => targets.push(TargetColumn {
                index,
                name: name.clone(),
                cast: cast_for(data_type),
            }),
            None => dropped.push(name.clone()),
        }
    }
    Projection { targets, dropped }
}

/// ` ON CONFLICT (key) DO UPDATE SET ...`, or `DO NOTHING` when the key is
/// the only column.
#[must_use]
pub fn build_upsert_clause(key: &str, targets: &[TargetColumn]) -> String {
    let update_cols: Vec<String> = targets
        .iter()
        .filter(|t| t.name != key)
        .map(|t| {
            format!(
                "{} = EXCLUDED.{}",
                quote_identifier(&t.name),
                quote_identifier(&t.name)
            )
        })
        .collect();

    if update_cols.is_empty() {
        format!(" ON CONFLICT ({}) DO NOTHING", quote_identifier(key))
    } else {
        format!(
            " ON CONFLICT ({}) DO UPDATE SET {}",
            quote_identifier(key),
            update_cols.join(", ")
        )
    }
}

/// Rows per statement so that `rows * columns` stays within the bind limit.
#[must_use]
pub fn rows_per_chunk(columns: usize) -> usize {
    (MAX_BIND_PARAMS / columns.max(1)).clamp(1, INSERT_CHUNK_SIZE)
}

/// Full statement text for `rows` rows.
#[must_use]
pub fn build_insert_sql(
    qualified_table: &str,
    targets: &[TargetColumn],
    rows: usize,
    upsert_clause: &str,
) -> String {
    let col_list = targets
        .iter()
        .map(|t| quote_identifier(&t.name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!("INSERT INTO {qualified_table} ({col_list}) VALUES ");
    let mut param = 0usize;
    for row in 0..rows {
        if row > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for (pos, target) in targets.iter().enumerate() {
            if pos > 0 {
                sql.push_str(", ");
            }
            param += 1;
            match &target.cast {
                Some(ty) => {
                    let _ = write!(sql, "CAST(${param}::text AS {ty})");
                }
                None => {
                    let _ = write!(sql, "${param}");
                }
            }
        }
        sql.push(')');
    }
    sql.push_str(upsert_clause);
    sql
}

fn cell_param(cell: &Cell) -> Option<String> {
    cell.as_text().map(std::borrow::Cow::into_owned)
}

/// Merge `batch` into `qualified_table` inside one transaction.
pub(crate) async fn write(
    client: &mut Client,
    qualified_table: &str,
    key: &str,
    targets: &[TargetColumn],
    batch: &Batch,
) -> Result<u64, LoadError> {
    if batch.is_empty() || targets.is_empty() {
        return Ok(0);
    }

    let upsert_clause = build_upsert_clause(key, targets);
    let chunk_rows = rows_per_chunk(targets.len());

    let tx = client
        .transaction()
        .await
        .map_err(|e| LoadError::postgres("Failed to begin transaction", e))?;

    let mut affected: u64 = 0;
    for (chunk_no, chunk) in batch.rows().chunks(chunk_rows).enumerate() {
        let sql = build_insert_sql(qualified_table, targets, chunk.len(), &upsert_clause);
        if chunk_no == 0 {
            let head: String = sql.chars().take(300).collect();
            tracing::debug!(sql_head = %head, "Upsert statement");
        }

        let params: Vec<Option<String>> = chunk
            .iter()
            .flat_map(|row| targets.iter().map(|t| cell_param(&row[t.index])))
            .collect();
        let param_refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect();

        let start = chunk_no * chunk_rows;
        affected += tx.execute(&sql, &param_refs).await.map_err(|e| {
            LoadError::postgres(
                &format!(
                    "INSERT failed for {qualified_table}, rows {start}-{}",
                    start + chunk.len()
                ),
                e,
            )
        })?;
    }

    tx.commit()
        .await
        .map_err(|e| LoadError::postgres("Failed to commit upsert", e))?;

    Ok(affected)
}
