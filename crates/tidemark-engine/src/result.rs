//! Stream drain and pipeline run result types.

use tidemark_sdk::validation::ValidationResult;
use tidemark_types::stream::{StreamKey, StreamKind};
use tidemark_types::watermark::Watermark;

/// What one stream drain did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSummary {
    pub pages: usize,
    /// Raw events received across all pages.
    pub fetched: usize,
    pub inserted: u64,
    /// Last watermark written, if any.
    pub watermark: Option<Watermark>,
    /// Stopped early by a shutdown request.
    pub cancelled: bool,
}

/// Outcome of one stream across all its attempts.
#[derive(Debug, Clone)]
pub struct StreamReport {
    pub stream: StreamKey,
    pub kind: StreamKind,
    pub attempts: u32,
    /// Summary of the successful attempt, default on failure.
    pub summary: StreamSummary,
    pub error: Option<String>,
    pub duration_secs: f64,
}

impl StreamReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub streams: Vec<StreamReport>,
    pub duration_secs: f64,
}

impl RunReport {
    #[must_use]
    pub fn total_fetched(&self) -> usize {
        self.streams.iter().map(|s| s.summary.fetched).sum()
    }

    #[must_use]
    pub fn total_inserted(&self) -> u64 {
        self.streams.iter().map(|s| s.summary.inserted).sum()
    }

    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.streams.iter().map(|s| s.attempts.saturating_sub(1)).sum()
    }

    /// Streams that failed permanently.
    #[must_use]
    pub fn failed(&self) -> Vec<&StreamReport> {
        self.streams.iter().filter(|s| !s.is_success()).collect()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.streams.iter().all(StreamReport::is_success)
    }
}

/// Result of a pipeline check.
#[derive(Debug)]
pub struct CheckResult {
    /// `(connector name, result)` per configured source.
    pub sources: Vec<(String, ValidationResult)>,
    pub destination: ValidationResult,
    pub state_ok: bool,
}

impl CheckResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state_ok
            && self.destination.is_success()
            && self.sources.iter().all(|(_, v)| v.is_success())
    }
}
