//! Run and check result types.

use tidemark_types::{QualityVerdict, Watermark};

/// How a run ended, short of an unrecoverable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Rows were upserted into the staging table.
    Loaded,
    /// The extractor returned no records.
    NoNewData,
    /// Records were fetched but none survived to the load step.
    NothingToLoad,
    /// The data-quality gate failed; nothing was loaded.
    Halted,
}

impl RunOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::NoNewData => "no new data",
            Self::NothingToLoad => "nothing to load",
            Self::Halted => "halted by data-quality gate",
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub records_fetched: u64,
    pub pages_fetched: u32,
    /// Rows reported affected by the upsert.
    pub records_loaded: u64,
    pub duplicates_removed: u64,
    /// Rows whose key was missing or blank; any makes the gate halt.
    pub missing_keys: u64,
    pub watermark_before: Option<Watermark>,
    /// Watermark persisted by this run, if it advanced.
    pub watermark_after: Option<Watermark>,
    pub verdict: QualityVerdict,
    pub truncated: bool,
    pub duration_secs: f64,
}

impl RunReport {
    pub(crate) fn new(watermark_before: Option<Watermark>) -> Self {
        Self {
            outcome: RunOutcome::NoNewData,
            records_fetched: 0,
            pages_fetched: 0,
            records_loaded: 0,
            duplicates_removed: 0,
            missing_keys: 0,
            watermark_before,
            watermark_after: None,
            verdict: QualityVerdict::new(),
            truncated: false,
            duration_secs: 0.0,
        }
    }

    #[must_use]
    pub fn watermark_advanced(&self) -> bool {
        self.watermark_after.is_some()
    }
}

/// Result of a connectivity and configuration check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Stored watermark, or the read error.
    pub watermark: Result<Option<Watermark>, String>,
    /// Staging table columns, or the connection error.
    pub destination: Result<Vec<String>, String>,
}

impl CheckResult {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.watermark.is_ok() && self.destination.is_ok()
    }
}
