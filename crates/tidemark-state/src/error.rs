//! Watermark store error types.

use std::path::PathBuf;

/// Errors produced by [`WatermarkStore`](crate::WatermarkStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File-system failure on the watermark file or its directory.
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A thread panicked while holding the connection lock.
    #[error("watermark store lock poisoned")]
    LockPoisoned,
}

impl StateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_error_displays_context() {
        let inner = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(1),
            Some("table not found".into()),
        );
        let err = StateError::Sqlite(inner);
        let msg = err.to_string();
        assert!(msg.contains("sqlite"), "got: {msg}");
    }

    #[test]
    fn lock_poisoned_displays() {
        let err = StateError::LockPoisoned;
        assert_eq!(err.to_string(), "watermark store lock poisoned");
    }

    #[test]
    fn io_error_names_path() {
        let inner = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = StateError::io("/var/lib/tidemark/wm.txt", inner);
        let msg = err.to_string();
        assert!(msg.contains("/var/lib/tidemark/wm.txt"), "got: {msg}");
        assert!(msg.contains("denied"), "got: {msg}");
    }
}
