//! Watermark store trait definition.
//!
//! [`WatermarkStore`] defines the storage contract for the single
//! checkpoint a pipeline keeps between runs. The value types live in
//! [`tidemark_types::state`].

use tidemark_types::state::{PipelineId, Watermark};

use crate::error;

/// Storage contract for pipeline watermarks.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn WatermarkStore>`.
pub trait WatermarkStore: Send + Sync {
    /// Read the watermark persisted for `pipeline`.
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet or the stored
    /// value is empty. The value is returned unvalidated.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) when the store
    /// exists but cannot be read.
    fn read(&self, pipeline: &PipelineId) -> error::Result<Option<Watermark>>;

    /// Overwrite the watermark for `pipeline`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn write(&self, pipeline: &PipelineId, watermark: &Watermark) -> error::Result<()>;
}
