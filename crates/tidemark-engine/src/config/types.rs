//! Pipeline configuration types.
//!
//! Every field has a default so that a run can be configured from the
//! environment alone. Only `source.endpoint` has no usable default.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Placeholder in `source.endpoint` replaced by `source.dataset_id`.
pub const DATASET_ID_PLACEHOLDER: &str = "{dataset_id}";

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Pipeline name; keys the persisted watermark.
    pub pipeline: String,
    /// Log verbosity used when `RUST_LOG` is unset.
    pub log_level: String,
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub state: StateConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline: "sf_fire_incidents".to_string(),
            log_level: "info".to_string(),
            source: SourceConfig::default(),
            destination: DestinationConfig::default(),
            state: StateConfig::default(),
        }
    }
}

/// Dataset API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Resource URL; may contain `{dataset_id}`.
    pub endpoint: String,
    /// Sent as `X-App-Token` when present.
    pub app_token: Option<String>,
    pub dataset_id: String,
    /// Records requested per page.
    pub batch_size: u64,
    /// Hard ceiling on pages fetched per run.
    pub max_pages: u32,
    pub request_timeout_secs: u64,
    /// Timestamp column used for the watermark filter and duplicate resolution.
    pub incremental_column: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            app_token: None,
            dataset_id: "wr8u-xric".to_string(),
            batch_size: 2000,
            max_pages: 10,
            request_timeout_secs: 60,
            incremental_column: "response_timestamp".to_string(),
        }
    }
}

impl SourceConfig {
    /// Endpoint with the dataset placeholder filled in.
    #[must_use]
    pub fn resolved_endpoint(&self) -> String {
        self.endpoint
            .replace(DATASET_ID_PLACEHOLDER, &self.dataset_id)
    }
}

/// Staging database settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DestinationConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub schema: String,
    pub table: String,
    /// Business key; primary key of the staging table.
    pub unique_key: String,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5439,
            database: "sf_fire_db".to_string(),
            user: "default_user".to_string(),
            password: "default_password".to_string(),
            schema: "public".to_string(),
            table: "stg_fire_incidents_raw".to_string(),
            unique_key: "incident_number".to_string(),
        }
    }
}

impl std::fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("schema", &self.schema)
            .field("table", &self.table)
            .field("unique_key", &self.unique_key)
            .finish()
    }
}

/// Which watermark backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackendKind {
    #[default]
    File,
    Sqlite,
}

impl std::str::FromStr for StateBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown state backend '{other}' (expected file or sqlite)")),
        }
    }
}

/// Watermark persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateConfig {
    pub backend: StateBackendKind,
    /// Watermark file, or database file for the `SQLite` backend.
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: StateBackendKind::File,
            path: PathBuf::from("./etl/last_run_timestamp.txt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.source.batch_size, 2000);
        assert_eq!(cfg.source.max_pages, 10);
        assert_eq!(cfg.source.request_timeout_secs, 60);
        assert_eq!(cfg.destination.port, 5439);
        assert_eq!(cfg.destination.table, "stg_fire_incidents_raw");
        assert_eq!(cfg.destination.unique_key, "incident_number");
        assert_eq!(cfg.state.backend, StateBackendKind::File);
    }

    #[test]
    fn endpoint_placeholder_is_resolved() {
        let src = SourceConfig {
            endpoint: "https://data.sfgov.org/resource/{dataset_id}.json".into(),
            ..SourceConfig::default()
        };
        assert_eq!(
            src.resolved_endpoint(),
            "https://data.sfgov.org/resource/wr8u-xric.json"
        );
    }

    #[test]
    fn debug_redacts_password() {
        let dest = DestinationConfig {
            password: "hunter2".into(),
            ..DestinationConfig::default()
        };
        let rendered = format!("{dest:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn backend_kind_from_str() {
        assert_eq!("SQLite".parse::<StateBackendKind>(), Ok(StateBackendKind::Sqlite));
        assert_eq!(" file ".parse::<StateBackendKind>(), Ok(StateBackendKind::File));
        assert!("redis".parse::<StateBackendKind>().is_err());
    }
}
