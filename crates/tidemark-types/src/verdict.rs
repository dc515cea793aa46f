//! Data-quality verdicts attached to a batch.

use serde::{Deserialize, Serialize};

/// Outcome of one data-quality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Warn => "WARN",
            Self::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckVerdict {
    /// Check name in upper snake case, e.g. `KEY_COMPLETENESS`.
    pub check: String,
    pub status: CheckStatus,
    /// Human-readable summary for logs.
    pub detail: String,
}

impl CheckVerdict {
    #[must_use]
    pub fn new(check: impl Into<String>, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            status,
            detail: detail.into(),
        }
    }

    /// Routing tag, e.g. `FAIL_KEY_COMPLETENESS`.
    #[must_use]
    pub fn tag(&self) -> String {
        format!("{}_{}", self.status, self.check)
    }
}

/// Ordered set of check results for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityVerdict {
    checks: Vec<CheckVerdict>,
}

impl QualityVerdict {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, verdict: CheckVerdict) {
        self.checks.push(verdict);
    }

    #[must_use]
    pub fn checks(&self) -> &[CheckVerdict] {
        &self.checks
    }

    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        self.checks.iter().map(CheckVerdict::tag).collect()
    }

    /// True when any check failed. A failing batch must not be loaded.
    #[must_use]
    pub fn should_halt(&self) -> bool {
        self.checks.iter().any(|c| c.status == CheckStatus::Fail)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
