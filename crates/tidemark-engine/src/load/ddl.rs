//! Staging table DDL and introspection.

use pg_escape::quote_identifier;
use tokio_postgres::Client;

use crate::errors::LoadError;

/// Schema-qualified, quoted table name.
#[must_use]
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(table))
}

/// `CREATE TABLE IF NOT EXISTS` for a permissive staging table.
///
/// The key column comes first as `TEXT PRIMARY KEY`; every other column is
/// `TEXT`. With no other columns the table holds the key alone.
#[must_use]
pub fn create_table_sql(qualified: &str, key: &str, columns: &[String]) -> String {
    let mut defs = vec![format!("{} TEXT PRIMARY KEY", quote_identifier(key))];
    defs.extend(
        columns
            .iter()
            .filter(|c| c.as_str() != key)
            .map(|c| format!("{} TEXT", quote_identifier(c))),
    );
    format!("CREATE TABLE IF NOT EXISTS {qualified} ({})", defs.join(", "))
}

/// Create the schema and table if missing.
pub(crate) async fn ensure_table(
    client: &Client,
    schema: &str,
    table: &str,
    key: &str,
    columns: &[String],
) -> Result<(), LoadError> {
    let create_schema = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_identifier(schema));
    client
        .execute(&create_schema, &[])
        .await
        .map_err(|e| LoadError::postgres(&format!("Failed to create schema '{schema}'"), e))?;

    let qualified = qualified_table(schema, table);
    let ddl = create_table_sql(&qualified, key, columns);
    tracing::debug!(sql = %ddl, "Ensuring staging table");
    client
        .execute(&ddl, &[])
        .await
        .map_err(|e| LoadError::postgres(&format!("Failed to create table {qualified}"), e))?;

    tracing::info!(table = %qualified, columns = columns.len(), "Staging table ready");
    Ok(())
}

/// Existing column names and their `information_schema` data types, in
/// ordinal order. Empty when the table does not exist.
pub(crate) async fn get_existing_columns(
    client: &Client,
    schema: &str,
    table: &str,
) -> Result<Vec<(String, String)>, LoadError> {
    let rows = client
        .query(
            "SELECT column_name, data_type \
             FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name = $2 \
             ORDER BY ordinal_position",
            &[&schema, &table],
        )
        .await
        .map_err(|e| LoadError::postgres("Failed to query columns", e))?;

    Ok(rows
        .iter()
        .map(|r| {
            let name: String = r.get(0);
            let dtype: String = r.get(1);
            (name, dtype)
        })
        .collect())
}
