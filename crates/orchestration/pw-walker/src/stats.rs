//! Statistics for walks and multi-bucket runs.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics collected while walking one bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalkStats {
    /// Bucket that was walked
    pub bucket: String,

    /// When the walk started
    pub started_at: Option<DateTime<Utc>>,

    /// When the walk completed
    pub completed_at: Option<DateTime<Utc>>,

    /// Prefixes whose listing was started (cached ones included)
    pub prefixes_listed: usize,

    /// Listing pages received
    pub pages_listed: usize,

    /// Keys sent to the output channel
    pub files_emitted: usize,

    /// Keys dropped by the extension rules
    pub files_excluded: usize,

    /// Keys not emitted because their prefix was cache-complete
    pub files_skipped: usize,

    /// Child prefixes pruned by the directory rules
    pub dirs_excluded: usize,

    /// Prefixes found cache-complete
    pub cache_hits: usize,

    /// Highest number of units holding a listing slot at once
    pub peak_active: usize,

    /// Errors encountered (one per failed prefix)
    pub errors: Vec<String>,
}

impl WalkStats {
    /// Create a stats record for `bucket` with the current time as start time.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Mark the walk as complete with the current time.
    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    /// Record an error.
    pub fn record_error(&mut self, error: impl ToString) {
        self.errors.push(error.to_string());
    }

    /// Duration of the walk.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Check if any errors occurred.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Get the number of errors.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Result of processing one bucket in a multi-bucket run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BucketOutcome {
    /// The bucket was walked (possibly with per-prefix errors)
    Walked(WalkStats),

    /// The bucket could not be walked at all
    Skipped { reason: String },
}

impl BucketOutcome {
    /// Returns true if the bucket was skipped or its walk had errors.
    pub fn has_errors(&self) -> bool {
        match self {
            Self::Walked(stats) => stats.has_errors(),
            Self::Skipped { .. } => true,
        }
    }

    /// Walk statistics, when the bucket was walked.
    pub fn stats(&self) -> Option<&WalkStats> {
        match self {
            Self::Walked(stats) => Some(stats),
            Self::Skipped { .. } => None,
        }
    }
}

/// Outcomes of a multi-bucket run, keyed by bucket name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Per-bucket outcomes
    pub outcomes: BTreeMap<String, BucketOutcome>,
}

impl RunSummary {
    /// Create an empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome for a bucket.
    pub fn record(&mut self, bucket: impl Into<String>, outcome: BucketOutcome) {
        self.outcomes.insert(bucket.into(), outcome);
    }

    /// Total keys emitted across all walked buckets.
    pub fn total_emitted(&self) -> usize {
        self.walked().map(|s| s.files_emitted).sum()
    }

    /// Total prefixes listed across all walked buckets.
    pub fn total_prefixes(&self) -> usize {
        self.walked().map(|s| s.prefixes_listed).sum()
    }

    /// Total errors, counting each skipped bucket once.
    pub fn total_errors(&self) -> usize {
        self.outcomes
            .values()
            .map(|outcome| match outcome {
                BucketOutcome::Walked(stats) => stats.error_count(),
                BucketOutcome::Skipped { .. } => 1,
            })
            .sum()
    }

    /// Returns true if any bucket was skipped or reported errors.
    pub fn has_errors(&self) -> bool {
        self.outcomes.values().any(BucketOutcome::has_errors)
    }

    fn walked(&self) -> impl Iterator<Item = &WalkStats> {
        self.outcomes.values().filter_map(BucketOutcome::stats)
    }
}
