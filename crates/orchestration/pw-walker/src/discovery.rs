//! Bucket discovery and selection.

use async_trait::async_trait;
use pw_error::{PwError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::TraversalCache;

/// Prefix of the cache key holding discovered buckets.
pub const BUCKETS_KEY_PREFIX: &str = "buckets:";

/// A bucket to walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    /// Bucket name
    pub name: String,

    /// Region hint, when the store reported one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl BucketInfo {
    /// Create a bucket entry without a location hint.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: None,
        }
    }

    /// Attach a location hint.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Trait for enumerating the buckets visible to the configured credentials.
#[async_trait]
pub trait BucketDiscovery: Send + Sync {
    /// List every bucket with its location hint.
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>>;
}

/// Cache key under which the bucket list for `fingerprint` is stored.
pub fn buckets_cache_key(fingerprint: &str) -> String {
    format!("{BUCKETS_KEY_PREFIX}{fingerprint}")
}

/// Discover buckets, reusing a cached result when one exists.
///
/// A non-empty result is stored in the cache under
/// [`buckets_cache_key`]. An unreadable cached value is ignored and the
/// store is asked again.
pub async fn discover_buckets(
    discovery: &dyn BucketDiscovery,
    cache: Option<&TraversalCache>,
    fingerprint: &str,
) -> Result<Vec<BucketInfo>> {
    let key = buckets_cache_key(fingerprint);

    if let Some(cached) = cache.and_then(|c| c.get(&key)) {
        match serde_json::from_str::<Vec<BucketInfo>>(&cached) {
            Ok(buckets) if !buckets.is_empty() => {
                debug!(count = buckets.len(), "Using cached bucket list");
                return Ok(buckets);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable cached bucket list"),
        }
    }

    let buckets = discovery.list_buckets().await?;
    info!(count = buckets.len(), "Discovered buckets");

    if let Some(cache) = cache
        && !buckets.is_empty()
    {
        match serde_json::to_string(&buckets) {
            Ok(json) => cache.set(key, json),
            Err(e) => warn!(error = %e, "Failed to cache bucket list"),
        }
    }

    Ok(buckets)
}

/// Choose the buckets to walk.
///
/// - nothing requested: every discovered bucket
/// - requested and discovered: only that bucket, keeping its location
/// - requested but not discovered (or discovery failed): a manual entry
///   without a location
/// - nothing requested and nothing discovered: an error
pub fn select_buckets(
    discovered: Result<Vec<BucketInfo>>,
    requested: Option<&str>,
) -> Result<Vec<BucketInfo>> {
    let requested = requested.map(str::trim).filter(|name| !name.is_empty());

    match (discovered, requested) {
        (Ok(buckets), None) if !buckets.is_empty() => Ok(buckets),
        (Ok(_), None) => Err(PwError::Discovery(
            "no buckets found and no bucket specified".to_string(),
        )),
        (Err(e), None) => Err(PwError::Discovery(format!(
            "failed to list buckets and no bucket specified: {e}"
        ))),
        (Ok(buckets), Some(name)) => {
            if let Some(found) = buckets.into_iter().find(|b| b.name == name) {
                return Ok(vec![found]);
            }
            warn!(bucket = %name, "Bucket not found in discovered list, using it as given");
            Ok(vec![BucketInfo::new(name)])
        }
        (Err(e), Some(name)) => {
            warn!(bucket = %name, error = %e, "Bucket discovery failed, using bucket as given");
            Ok(vec![BucketInfo::new(name)])
        }
    }
}
