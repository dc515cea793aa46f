//! Pipeline configuration: types, YAML parsing, environment overrides, validation.

pub mod env;
pub mod parser;
pub mod types;
pub mod validator;

use std::path::Path;

use anyhow::Result;

pub use types::{DestinationConfig, PipelineConfig, SourceConfig, StateBackendKind, StateConfig};

/// Build the effective configuration for a run.
///
/// Defaults, then the YAML file when one is given, then process
/// environment variables. The result is validated before it is returned.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, an environment
/// override is malformed, or validation fails.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    parser::resolve_config(path, |key| std::env::var(key).ok())
}
