//! Plain-text file implementation of [`WatermarkStore`].
//!
//! The file holds the watermark and nothing else. A missing file, or one
//! containing only whitespace, reads as "no watermark".

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tidemark_types::state::{PipelineId, Watermark};

use crate::backend::WatermarkStore;
use crate::error::{self, StateError};

/// Watermark stored in a single text file.
///
/// The pipeline id is not part of the file layout; configure one file per
/// pipeline.
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl WatermarkStore for FileWatermarkStore {
    fn read(&self, pipeline: &PipelineId) -> error::Result<Option<Watermark>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(
                    pipeline = pipeline.as_str(),
                    path = %self.path.display(),
                    "No watermark file; treating as first run"
                );
                return Ok(None);
            }
            Err(e) => return Err(StateError::io(&self.path, e)),
        };

        let value = contents.trim();
        if value.is_empty() {
            tracing::debug!(
                pipeline = pipeline.as_str(),
                path = %self.path.display(),
                "Watermark file is empty"
            );
            return Ok(None);
        }
        Ok(Some(Watermark::new(value)))
    }

    fn write(&self, pipeline: &PipelineId, watermark: &Watermark) -> error::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StateError::io(parent, e))?;
            }
        }

        // Write-then-rename keeps the previous value intact if we crash midway.
        let tmp = self.temp_path();
        fs::write(&tmp, watermark.as_str()).map_err(|e| StateError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StateError::io(&self.path, e))?;

        tracing::debug!(
            pipeline = pipeline.as_str(),
            path = %self.path.display(),
            watermark = watermark.as_str(),
            "Watermark file written"
        );
        Ok(())
    }
}
