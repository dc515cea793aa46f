//! Watermark persistence for tidemark.
//!
//! Provides the [`WatermarkStore`] trait with a plain-file backend
//! ([`FileWatermarkStore`]) and a `SQLite` backend
//! ([`SqliteWatermarkStore`]).

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod file;
pub mod sqlite;

pub use backend::WatermarkStore;
pub use error::StateError;
pub use file::FileWatermarkStore;
pub use sqlite::SqliteWatermarkStore;
