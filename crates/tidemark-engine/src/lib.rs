//! Incremental sync engine for tidemark.
//!
//! One run reads the persisted watermark, pages new records out of the
//! dataset API, normalizes and validates them, upserts them into the
//! staging table, and only then advances the watermark.

#![warn(clippy::pedantic)]

pub mod checkpoint;
pub mod config;
pub mod errors;
pub mod extract;
pub mod load;
pub mod orchestrator;
pub mod result;
pub mod transform;

pub use errors::{ExtractError, LoadError, PipelineError};
pub use orchestrator::{check_pipeline, open_state_store, run_pipeline, run_sync};
pub use result::{CheckResult, RunOutcome, RunReport};
