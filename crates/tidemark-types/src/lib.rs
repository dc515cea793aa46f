//! Shared tidemark record, watermark, and data-quality types.
//!
//! This crate holds pure data types only; every crate in the workspace
//! depends on it and it performs no I/O.

#![warn(clippy::pedantic)]

pub mod record;
pub mod state;
pub mod timestamp;
pub mod verdict;

pub use record::{Batch, Cell, RawRecord};
pub use state::{PipelineId, Watermark, WatermarkError};
pub use verdict::{CheckStatus, CheckVerdict, QualityVerdict};
