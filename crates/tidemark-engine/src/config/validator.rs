//! Semantic validation for resolved pipeline configuration values.

use anyhow::{bail, Result};

use crate::config::types::PipelineConfig;
use crate::transform::normalize::canonical_column_name;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "warning", "error"];

/// Validate a resolved pipeline configuration.
/// Returns `Ok(())` if valid, Err with all validation errors if not.
///
/// # Errors
///
/// Returns an error listing all validation failures found in the config.
pub fn validate_pipeline(config: &PipelineConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.pipeline.trim().is_empty() {
        errors.push("Pipeline name must not be empty".to_string());
    }

    let endpoint = config.source.resolved_endpoint();
    if endpoint.trim().is_empty() {
        errors.push("API endpoint is required (set API_ENDPOINT or source.endpoint)".to_string());
    } else if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        errors.push(format!("API endpoint '{endpoint}' must be an http(s) URL"));
    }

    if config.source.batch_size == 0 {
        errors.push("batch_size must be at least 1".to_string());
    }
    if config.source.max_pages == 0 {
        errors.push("max_pages must be at least 1".to_string());
    }
    if config.source.request_timeout_secs == 0 {
        errors.push("request_timeout_secs must be at least 1".to_string());
    }
    if config.source.incremental_column.trim().is_empty() {
        errors.push("incremental_column must not be empty".to_string());
    }

    let dest = &config.destination;
    if dest.port == 0 {
        errors.push("Database port must not be 0".to_string());
    }
    for (field, value) in [
        ("host", &dest.host),
        ("database", &dest.database),
        ("schema", &dest.schema),
        ("table", &dest.table),
        ("unique_key", &dest.unique_key),
    ] {
        if value.trim().is_empty() {
            errors.push(format!("destination.{field} must not be empty"));
        }
    }

    // Batch columns are canonicalised before the gate and the load, so a
    // key spelled any other way would never match.
    let canonical_key = canonical_column_name(&dest.unique_key);
    if !dest.unique_key.trim().is_empty() && canonical_key != dest.unique_key {
        errors.push(format!(
            "destination.unique_key '{}' must be a canonical column name (did you mean '{canonical_key}'?)",
            dest.unique_key
        ));
    }

    if config.state.path.as_os_str().is_empty() {
        errors.push("state.path must not be empty".to_string());
    }

    if !LOG_LEVELS.contains(&config.log_level.to_ascii_lowercase().as_str()) {
        errors.push(format!(
            "Unknown log level '{}' (expected one of: {})",
            config.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Pipeline validation failed:\n  - {}", errors.join("\n  - "));
    }
}
