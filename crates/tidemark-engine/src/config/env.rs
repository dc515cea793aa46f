//! Environment variable overrides.
//!
//! Applied after YAML parsing; a set variable always wins over the file.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

use crate::config::types::{PipelineConfig, StateBackendKind};

/// Apply every recognised environment variable to `config`.
///
/// `lookup` returns the value of a variable, or `None` when unset. Empty
/// values count as unset.
///
/// # Errors
///
/// Returns an error if a numeric or enumerated variable cannot be parsed.
pub fn apply_env_overrides<F>(config: &mut PipelineConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("API_ENDPOINT") {
        config.source.endpoint = v;
    }
    if let Some(v) = get("API_APP_TOKEN") {
        config.source.app_token = Some(v);
    }
    if let Some(v) = get("SOCRATA_DATASET_ID") {
        config.source.dataset_id = v;
    }
    if let Some(v) = get("BATCH_SIZE") {
        config.source.batch_size = parse_number("BATCH_SIZE", strip_inline_comment(&v))?;
    }
    if let Some(v) = get("MAX_PAGES") {
        config.source.max_pages = parse_number("MAX_PAGES", &v)?;
    }
    if let Some(v) = get("REQUEST_TIMEOUT_SECS") {
        config.source.request_timeout_secs = parse_number("REQUEST_TIMEOUT_SECS", &v)?;
    }
    if let Some(v) = get("INCREMENTAL_COLUMN") {
        config.source.incremental_column = v;
    }

    if let Some(v) = get("DB_HOST") {
        config.destination.host = v;
    }
    if let Some(v) = get("DB_PORT") {
        config.destination.port = parse_number("DB_PORT", &v)?;
    }
    if let Some(v) = get("DB_NAME") {
        config.destination.database = v;
    }
    if let Some(v) = get("DB_USER") {
        config.destination.user = v;
    }
    if let Some(v) = get("DB_PASSWORD") {
        config.destination.password = v;
    }
    if let Some(v) = get("DB_SCHEMA") {
        config.destination.schema = v;
    }
    if let Some(v) = get("STAGING_TABLE_NAME") {
        config.destination.table = v;
    }
    if let Some(v) = get("UNIQUE_KEY") {
        config.destination.unique_key = v;
    }

    if let Some(v) = get("STATE_BACKEND") {
        config.state.backend =
            StateBackendKind::from_str(&v).map_err(|e| anyhow!("STATE_BACKEND: {e}"))?;
    }
    if let Some(v) = get("LAST_RUN_TIMESTAMP_FILE") {
        config.state.path = PathBuf::from(v);
    }
    if let Some(v) = get("LOGGING_LEVEL") {
        config.log_level = v.trim().to_ascii_lowercase();
    }

    Ok(())
}

/// `.env` files in the wild carry trailing `# comments` on values.
fn strip_inline_comment(value: &str) -> &str {
    value.split('#').next().unwrap_or_default().trim()
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{key} must be a non-negative integer, got '{raw}'"))
}
