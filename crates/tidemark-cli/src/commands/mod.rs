pub mod check;
pub mod run;

use std::path::Path;

use anyhow::Result;
use tidemark_engine::config::{load_config, PipelineConfig};

use crate::logging;

/// Unrecoverable error, including invalid configuration.
pub const EXIT_FAILURE: u8 = 1;
/// The data-quality gate halted the run.
pub const EXIT_HALTED: u8 = 2;

/// Resolve configuration, then start logging at the effective level.
///
/// `--log-level` wins over the configured level.
fn load_and_init(config_path: Option<&Path>, log_level: Option<&str>) -> Result<PipelineConfig> {
    match load_config(config_path) {
        Ok(config) => {
            logging::init(log_level.unwrap_or(&config.log_level));
            tracing::debug!(config = ?config, "Configuration resolved");
            Ok(config)
        }
        Err(e) => {
            logging::init(log_level.unwrap_or("info"));
            Err(e)
        }
    }
}
