//! Configuration types for a walk.

use serde::{Deserialize, Serialize};

use crate::exclude::{DEFAULT_EXCLUDED_EXTENSIONS, DEFAULT_EXCLUDED_KEYWORDS, ExclusionSet};

/// Default number of simultaneously active walk units.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default capacity of the channel between the walker and the sink.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Default path delimiter.
pub const DEFAULT_DELIMITER: &str = "/";

/// Configuration for a walk run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkConfig {
    /// Maximum units holding a listing slot at once, across all buckets
    pub concurrency: usize,

    /// Path delimiter used for hierarchical listing
    pub delimiter: String,

    /// Excluded file extensions (`none` matches names without one)
    pub excluded_extensions: Vec<String>,

    /// Excluded directory names
    pub excluded_keywords: Vec<String>,

    /// Capacity of the walker-to-sink channel
    pub channel_capacity: usize,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            delimiter: DEFAULT_DELIMITER.to_string(),
            excluded_extensions: Vec::new(),
            excluded_keywords: Vec::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl WalkConfig {
    /// Create a new walk configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency limit. Zero is raised to one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the path delimiter.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Add excluded file extensions.
    pub fn with_excluded_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_extensions
            .extend(extensions.into_iter().map(Into::into));
        self
    }

    /// Add the built-in media/asset extension list.
    pub fn with_default_excluded_extensions(self) -> Self {
        self.with_excluded_extensions(DEFAULT_EXCLUDED_EXTENSIONS.iter().copied())
    }

    /// Add excluded directory keywords.
    pub fn with_excluded_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_keywords
            .extend(keywords.into_iter().map(Into::into));
        self
    }

    /// Add the built-in directory keyword list.
    pub fn with_default_excluded_keywords(self) -> Self {
        self.with_excluded_keywords(DEFAULT_EXCLUDED_KEYWORDS.iter().copied())
    }

    /// Set the walker-to-sink channel capacity. Zero is raised to one.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Concurrency limit actually applied (never below one).
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Build the exclusion set for this configuration.
    pub fn exclusions(&self) -> ExclusionSet {
        ExclusionSet::new(
            &self.excluded_extensions,
            &self.excluded_keywords,
            self.delimiter.as_str(),
        )
    }
}
