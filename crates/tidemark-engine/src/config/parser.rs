//! Configuration resolution: YAML document, `${VAR}` substitution,
//! environment overrides, then validation.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::env::apply_env_overrides;
use crate::config::types::PipelineConfig;
use crate::config::validator::validate_pipeline;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = input.to_string();
    let mut missing = Vec::new();

    for cap in ENV_VAR_RE.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => {
                if !missing.iter().any(|m| m == var_name) {
                    missing.push(var_name.to_string());
                }
            }
        }
    }

    if !missing.is_empty() {
        anyhow::bail!("Missing environment variable(s): {}", missing.join(", "));
    }

    Ok(result)
}

/// Decode a pipeline document. Sections and fields it leaves out keep
/// their defaults; unknown fields are rejected.
///
/// # Errors
///
/// Returns an error if a referenced variable is unset or the document does
/// not fit [`PipelineConfig`].
pub fn decode_yaml(document: &str) -> Result<PipelineConfig> {
    serde_yaml::from_str(&substitute_env_vars(document)?)
        .context("Pipeline YAML does not match the tidemark configuration layout")
}

/// Read and decode a pipeline file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded.
pub fn read_pipeline_file(path: &Path) -> Result<PipelineConfig> {
    let document = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read pipeline file {}", path.display()))?;
    decode_yaml(&document).with_context(|| format!("Invalid pipeline file {}", path.display()))
}

/// Effective configuration for a run: defaults, overlaid by the optional
/// file, overlaid by whatever `lookup` returns for the recognised
/// environment variables. Validated before it is returned.
///
/// # Errors
///
/// Returns an error if any layer fails to apply or validation fails.
pub fn resolve_config<F>(path: Option<&Path>, lookup: F) -> Result<PipelineConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Reading pipeline file");
            read_pipeline_file(path)?
        }
        None => PipelineConfig::default(),
    };
    apply_env_overrides(&mut config, lookup)?;
    validate_pipeline(&config)?;
    Ok(config)
}
