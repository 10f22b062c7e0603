//! In-memory object store.
//!
//! Emulates hierarchical listing over a flat key space with the same
//! delimiter grouping and marker pagination rules as S3, plus hooks for
//! injecting failures and observing how the store is being called.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use pw_error::{ListingError, PwError, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use super::{ListerFactory, ListingPage, ObjectLister};
use crate::discovery::{BucketDiscovery, BucketInfo};

/// Default number of entries returned per page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// In-memory bucket store implementing listing, discovery and lister creation.
///
/// Cloning is cheap and clones share the same data.
///
/// # Example
///
/// ```
/// use pw_walker::MemoryStore;
///
/// let store = MemoryStore::new().with_page_size(2);
/// store.put("docs", "readme.txt");
/// store.put("docs", "img/a.png");
/// assert_eq!(store.object_count("docs"), 2);
/// ```
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    buckets: RwLock<BTreeMap<String, BucketData>>,
    page_size: AtomicUsize,
    latency: Mutex<Option<Duration>>,
    failing_prefixes: RwLock<HashSet<(String, String)>>,
    failing_clients: RwLock<HashSet<String>>,
    discovery_fails: AtomicBool,
    calls: Mutex<HashMap<(String, String), usize>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

#[derive(Default)]
struct BucketData {
    location: Option<String>,
    keys: BTreeSet<String>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let store = Self::default();
        store
            .inner
            .page_size
            .store(DEFAULT_PAGE_SIZE, Ordering::Relaxed);
        store
    }

    /// Set the maximum number of entries (keys plus prefixes) per page.
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.inner
            .page_size
            .store(page_size.max(1), Ordering::Relaxed);
        self
    }

    /// Delay every listing call, so concurrent calls overlap.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.inner.latency.lock() = Some(latency);
        self
    }

    /// Create an empty bucket with an optional location hint.
    pub fn add_bucket(&self, bucket: &str, location: Option<&str>) {
        let mut buckets = self.inner.buckets.write();
        let data = buckets.entry(bucket.to_string()).or_default();
        data.location = location.map(str::to_string);
    }

    /// Store an object, creating the bucket if needed.
    pub fn put(&self, bucket: &str, key: &str) {
        self.inner
            .buckets
            .write()
            .entry(bucket.to_string())
            .or_default()
            .keys
            .insert(key.to_string());
    }

    /// Delete an object.
    pub fn delete(&self, bucket: &str, key: &str) -> bool {
        self.inner
            .buckets
            .write()
            .get_mut(bucket)
            .is_some_and(|data| data.keys.remove(key))
    }

    /// Number of objects stored in a bucket.
    pub fn object_count(&self, bucket: &str) -> usize {
        self.inner
            .buckets
            .read()
            .get(bucket)
            .map_or(0, |data| data.keys.len())
    }

    /// Make every listing of `prefix` in `bucket` fail.
    pub fn fail_prefix(&self, bucket: &str, prefix: &str) {
        self.inner
            .failing_prefixes
            .write()
            .insert((bucket.to_string(), prefix.to_string()));
    }

    /// Make lister creation for `bucket` fail.
    pub fn fail_client(&self, bucket: &str) {
        self.inner.failing_clients.write().insert(bucket.to_string());
    }

    /// Make bucket discovery fail.
    pub fn fail_discovery(&self, fail: bool) {
        self.inner.discovery_fails.store(fail, Ordering::Relaxed);
    }

    /// Number of listing calls made for `prefix` in `bucket`.
    pub fn list_calls(&self, bucket: &str, prefix: &str) -> usize {
        self.inner
            .calls
            .lock()
            .get(&(bucket.to_string(), prefix.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Total listing calls made against the store.
    pub fn total_list_calls(&self) -> usize {
        self.inner.calls.lock().values().sum()
    }

    /// Prefixes of `bucket` that were listed at least once, sorted.
    pub fn listed_prefixes(&self, bucket: &str) -> Vec<String> {
        let mut prefixes: Vec<String> = self
            .inner
            .calls
            .lock()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, p)| p.clone())
            .collect();
        prefixes.sort();
        prefixes
    }

    /// Highest number of listing calls observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.inner.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Forget recorded calls and the in-flight peak.
    pub fn reset_counters(&self) {
        self.inner.calls.lock().clear();
        self.inner.peak_in_flight.store(0, Ordering::SeqCst);
    }

    fn page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
        marker: Option<&str>,
    ) -> Result<ListingPage> {
        let buckets = self.inner.buckets.read();
        let data = buckets
            .get(bucket)
            .ok_or_else(|| ListingError::NoSuchBucket(bucket.to_string()))?;
        let page_size = self.inner.page_size.load(Ordering::Relaxed).max(1);

        let mut page = ListingPage::default();
        let mut taken = 0usize;
        let mut last: Option<String> = None;

        let range = data
            .keys
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded));

        for key in range {
            if !key.starts_with(prefix) {
                break;
            }

            let rest = &key[prefix.len()..];
            let grouped = if delimiter.is_empty() {
                None
            } else {
                rest.find(delimiter)
                    .map(|idx| format!("{prefix}{}", &rest[..idx + delimiter.len()]))
            };
            let name = grouped.as_deref().unwrap_or(key.as_str());

            if marker.is_some_and(|m| name <= m) {
                continue;
            }
            if last.as_deref() == Some(name) {
                continue;
            }

            if taken == page_size {
                page.truncated = true;
                page.next_marker = last;
                return Ok(page);
            }

            match grouped {
                Some(ref common) => page.prefixes.push(common.clone()),
                None => page.keys.push(key.clone()),
            }
            last = Some(name.to_string());
            taken += 1;
        }

        Ok(page)
    }
}

struct InFlight<'a>(&'a StoreInner);

impl<'a> InFlight<'a> {
    fn enter(inner: &'a StoreInner) -> Self {
        let now = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(inner)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectLister for MemoryStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
        marker: Option<&str>,
    ) -> Result<ListingPage> {
        let _in_flight = InFlight::enter(&self.inner);

        *self
            .inner
            .calls
            .lock()
            .entry((bucket.to_string(), prefix.to_string()))
            .or_insert(0) += 1;

        let latency = *self.inner.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self
            .inner
            .failing_prefixes
            .read()
            .contains(&(bucket.to_string(), prefix.to_string()))
        {
            return Err(ListingError::AccessDenied(format!("{bucket}:{prefix}")).into());
        }

        self.page(bucket, prefix, delimiter, marker)
    }
}

#[async_trait]
impl BucketDiscovery for MemoryStore {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        if self.inner.discovery_fails.load(Ordering::Relaxed) {
            return Err(PwError::Discovery("ListBuckets denied".to_string()));
        }

        Ok(self
            .inner
            .buckets
            .read()
            .iter()
            .map(|(name, data)| BucketInfo {
                name: name.clone(),
                location: data.location.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl ListerFactory for MemoryStore {
    async fn lister_for(&self, bucket: &BucketInfo) -> Result<Arc<dyn ObjectLister>> {
        if self.inner.failing_clients.read().contains(&bucket.name) {
            return Err(PwError::Config(format!(
                "cannot build client for bucket {}",
                bucket.name
            )));
        }
        Ok(Arc::new(self.clone()))
    }
}
