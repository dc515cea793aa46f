//! Error model for a sync run.
//!
//! Each stage has its own error type; [`PipelineError`] is what the
//! orchestrator returns and what the CLI maps to an exit status.

use tidemark_state::StateError;
use tidemark_types::WatermarkError;

/// Failure while pulling pages from the dataset API.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The persisted watermark cannot be used as a filter bound.
    #[error("refusing to extract: {0}")]
    InvalidWatermark(#[from] WatermarkError),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Transport failure, timeout, or unreadable body.
    #[error("request for page at offset {offset} failed: {source}")]
    Http {
        offset: u64,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status.
    #[error("page at offset {offset} returned HTTP {status}: {body}")]
    Status { offset: u64, status: u16, body: String },

    /// The body was not a JSON array of flat objects.
    #[error("page at offset {offset} is malformed: {reason}")]
    Malformed { offset: u64, reason: String },
}

/// Failure while writing to the staging table.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Driver error with the operation that raised it.
    #[error("{message}")]
    Postgres {
        message: String,
        #[source]
        source: tokio_postgres::Error,
    },

    /// The staging table lacks the unique key column, so a merge is impossible.
    #[error("staging table {table} has no column '{key}'")]
    MissingKeyColumn { table: String, key: String },

    /// The sink was used after [`close`](crate::load::StagingSink::close).
    #[error("staging connection is closed")]
    Closed,
}

impl LoadError {
    pub(crate) fn postgres(prefix: &str, source: tokio_postgres::Error) -> Self {
        Self::Postgres {
            message: format_pg_error(prefix, &source),
            source,
        }
    }
}

/// Render a driver error with SQLSTATE, detail, and hint when the server sent them.
pub(crate) fn format_pg_error(prefix: &str, error: &tokio_postgres::Error) -> String {
    if let Some(db_error) = error.as_db_error() {
        let detail = db_error.detail().unwrap_or("n/a");
        let hint = db_error.hint().unwrap_or("n/a");
        format!(
            "{prefix}: {} (sqlstate={} severity={} detail={} hint={})",
            db_error.message(),
            db_error.code().code(),
            db_error.severity(),
            detail,
            hint
        )
    } else {
        format!("{prefix}: {error}")
    }
}

/// Unrecoverable failure of a run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("watermark store: {0}")]
    State(#[from] StateError),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    /// The unique key column does not exist in the fetched data at all.
    #[error("unique key column '{0}' is missing from the batch")]
    MissingKeyColumn(String),

    #[error("load failed: {0}")]
    Load(#[from] LoadError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_watermark_names_value() {
        let err: PipelineError =
            ExtractError::from(WatermarkError("garbage".into())).into();
        let msg = err.to_string();
        assert!(msg.starts_with("extraction failed"), "got: {msg}");
        assert!(msg.contains("garbage"), "got: {msg}");
    }

    #[test]
    fn status_error_display() {
        let err = ExtractError::Status {
            offset: 4000,
            status: 503,
            body: "unavailable".into(),
        };
        assert_eq!(
            err.to_string(),
            "page at offset 4000 returned HTTP 503: unavailable"
        );
    }

    #[test]
    fn missing_key_column_display() {
        let err = LoadError::MissingKeyColumn {
            table: "public.stg".into(),
            key: "incident_number".into(),
        };
        assert!(err.to_string().contains("incident_number"));
    }

    #[test]
    fn state_error_converts() {
        let err: PipelineError = StateError::LockPoisoned.into();
        assert!(matches!(err, PipelineError::State(_)));
    }
}
