//! Watermark and pipeline identity types.
//!
//! Kept in the types crate so the state backends and the engine share them
//! without depending on each other.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::timestamp::{format_watermark, parse_timestamp};

/// Opaque pipeline identifier, used to key persisted watermarks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineId(String);

impl PipelineId {
    /// Create a new pipeline identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PipelineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored watermark that does not parse as a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("watermark '{0}' is not a valid ISO-8601 timestamp")]
pub struct WatermarkError(pub String);

/// Last incremental-column value of a successfully loaded batch.
///
/// Stored as text exactly as persisted. Parsing is deferred to
/// [`Watermark::parse`] so a corrupted state value can be reported by the
/// component that uses it instead of being discarded on read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(String);

impl Watermark {
    /// Wrap a persisted value without validating it.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Build a watermark from a parsed timestamp in the persisted layout.
    #[must_use]
    pub fn from_timestamp(ts: &NaiveDateTime) -> Self {
        Self(format_watermark(ts))
    }

    /// Borrow the raw text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate the watermark as a timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`WatermarkError`] when the text is not a recognised
    /// ISO-8601 timestamp.
    pub fn parse(&self) -> Result<NaiveDateTime, WatermarkError> {
        parse_timestamp(&self.0).ok_or_else(|| WatermarkError(self.0.clone()))
    }

    /// Lexicographic comparison; the persisted layout sorts chronologically.
    #[must_use]
    pub fn is_newer_than(&self, other: &Watermark) -> bool {
        self.0 > other.0
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
