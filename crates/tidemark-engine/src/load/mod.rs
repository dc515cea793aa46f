//! Staging-table loader.
//!
//! [`StagingSink`] is the seam the orchestrator loads through;
//! [`PostgresLoader`] is the production implementation.

pub mod client;
pub mod ddl;
pub mod upsert;

use async_trait::async_trait;
use tidemark_types::Batch;

use crate::errors::LoadError;

pub use client::PostgresLoader;

/// Destination for normalized, validated batches.
#[async_trait]
pub trait StagingSink: Send {
    /// Create the staging table if it does not exist yet.
    ///
    /// `columns` is the incoming column set; an empty slice creates a table
    /// holding only the key column.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the DDL fails.
    async fn ensure_table(&mut self, columns: &[String]) -> Result<(), LoadError>;

    /// Merge `batch` into the table in one transaction. Returns rows affected.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] on any failure; nothing from the batch is applied.
    async fn upsert(&mut self, batch: &Batch) -> Result<u64, LoadError>;

    /// Release the connection. Safe to call more than once.
    async fn close(&mut self);
}
