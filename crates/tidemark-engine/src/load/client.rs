//! `PostgreSQL` staging loader.

use async_trait::async_trait;
use tidemark_types::Batch;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, Config as PgConfig, NoTls};

use super::{ddl, upsert, StagingSink};
use crate::config::DestinationConfig;
use crate::errors::LoadError;

/// Loader holding one connection for the duration of a run.
pub struct PostgresLoader {
    client: Option<Client>,
    connection: Option<JoinHandle<()>>,
    schema: String,
    table: String,
    unique_key: String,
}

/// Driver config for the destination settings.
#[must_use]
pub fn pg_config(config: &DestinationConfig) -> PgConfig {
    let mut pg = PgConfig::new();
    pg.host(&config.host);
    pg.port(config.port);
    pg.user(&config.user);
    if !config.password.is_empty() {
        pg.password(&config.password);
    }
    pg.dbname(&config.database);
    pg.application_name("tidemark");
    pg
}

impl PostgresLoader {
    /// Connect using the destination configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Postgres`] if the connection cannot be established.
    pub async fn connect(config: &DestinationConfig) -> Result<Self, LoadError> {
        Self::connect_with(
            &pg_config(config),
            &config.schema,
            &config.table,
            &config.unique_key,
        )
        .await
    }

    /// Connect with an explicit driver config.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Postgres`] if the connection cannot be established.
    pub async fn connect_with(
        pg: &PgConfig,
        schema: &str,
        table: &str,
        unique_key: &str,
    ) -> Result<Self, LoadError> {
        let (client, connection) = pg
            .connect(NoTls)
            .await
            .map_err(|e| LoadError::postgres("Connection failed", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
        });

        tracing::info!(schema, table, "Connected to staging database");
        Ok(Self {
            client: Some(client),
            connection: Some(handle),
            schema: schema.to_string(),
            table: table.to_string(),
            unique_key: unique_key.to_string(),
        })
    }

    fn client(&self) -> Result<&Client, LoadError> {
        self.client.as_ref().ok_or(LoadError::Closed)
    }

    #[must_use]
    pub fn qualified_table(&self) -> String {
        ddl::qualified_table(&self.schema, &self.table)
    }

    /// Round-trip a trivial query.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the server does not answer.
    pub async fn ping(&self) -> Result<(), LoadError> {
        self.client()?
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| LoadError::postgres("Connection test failed", e))?;
        Ok(())
    }

    /// Column names currently in the staging table; empty if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if introspection fails.
    pub async fn table_columns(&self) -> Result<Vec<String>, LoadError> {
        let cols = ddl::get_existing_columns(self.client()?, &self.schema, &self.table).await?;
        Ok(cols.into_iter().map(|(name, _)| name).collect())
    }
}

#[async_trait]
impl StagingSink for PostgresLoader {
    async fn ensure_table(&mut self, columns: &[String]) -> Result<(), LoadError> {
        ddl::ensure_table(
            self.client()?,
            &self.schema,
            &self.table,
            &self.unique_key,
            columns,
        )
        .await
    }

    async fn upsert(&mut self, batch: &Batch) -> Result<u64, LoadError> {
        let qualified = self.qualified_table();
        if batch.is_empty() {
            tracing::info!(table = %qualified, "Empty batch; nothing to upsert");
            return Ok(0);
        }

        let table_columns =
            ddl::get_existing_columns(self.client()?, &self.schema, &self.table).await?;
        if !table_columns.iter().any(|(c, _)| *c == self.unique_key) {
            return Err(LoadError::MissingKeyColumn {
                table: qualified,
                key: self.unique_key.clone(),
            });
        }

        let projection = upsert::project_columns(batch.columns(), &table_columns);
        if !projection.dropped.is_empty() {
            tracing::warn!(
                table = %qualified,
                dropped = ?projection.dropped,
                "Columns not in staging table; dropping them from the load"
            );
        }
        if !projection.targets.iter().any(|t| t.name == self.unique_key) {
            return Err(LoadError::MissingKeyColumn {
                table: "incoming batch".to_string(),
                key: self.unique_key.clone(),
            });
        }

        let client = self.client.as_mut().ok_or(LoadError::Closed)?;
        let affected =
            upsert::write(client, &qualified, &self.unique_key, &projection.targets, batch)
                .await?;

        tracing::info!(
            table = %qualified,
            rows = batch.num_rows(),
            affected,
            "Upsert committed"
        );
        Ok(affected)
    }

    async fn close(&mut self) {
        if self.client.take().is_some() {
            tracing::debug!("Closing staging connection");
        }
        if let Some(handle) = self.connection.take() {
            handle.abort();
        }
    }
}
