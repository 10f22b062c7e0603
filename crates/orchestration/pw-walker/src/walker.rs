//! Recursive prefix walker.
//!
//! Every discovered prefix becomes its own task. A task holds one slot of the
//! walker's semaphore only while it is listing; it gives the slot back before
//! waiting for the child tasks it spawned, so a deep tree can never starve
//! the limiter.

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::{COMPLETE_MARKER, TraversalCache, cache_key};
use crate::config::WalkConfig;
use crate::exclude::{ExclusionSet, file_name};
use crate::listing::ObjectLister;
use crate::stats::WalkStats;

/// Concurrent, cache-aware walker over a bucket's prefix tree.
///
/// The concurrency limit applies to every walk made through the same
/// `Walker`, so walking several buckets (even simultaneously) never exceeds
/// it.
pub struct Walker {
    exclusions: Arc<ExclusionSet>,
    limiter: Arc<Semaphore>,
    cache: Option<Arc<TraversalCache>>,
    delimiter: String,
    concurrency: usize,
}

impl Walker {
    /// Create a walker from a configuration and an optional traversal cache.
    pub fn new(config: &WalkConfig, cache: Option<Arc<TraversalCache>>) -> Self {
        let concurrency = config.effective_concurrency();
        Self {
            exclusions: Arc::new(config.exclusions()),
            limiter: Arc::new(Semaphore::new(concurrency)),
            cache,
            delimiter: config.delimiter.clone(),
            concurrency,
        }
    }

    /// Concurrency limit in effect.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Exclusion rules applied by this walker.
    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    /// Traversal cache, if one is attached.
    pub fn cache(&self) -> Option<&Arc<TraversalCache>> {
        self.cache.as_ref()
    }

    /// Walk `bucket` from `prefix`, sending every non-excluded key to `output`.
    ///
    /// Returns once every task of the walk has finished; `output` is dropped
    /// at that point, which closes the channel. Failures are confined to the
    /// prefix they happened in and are reported in [`WalkStats::errors`].
    pub async fn walk(
        &self,
        lister: Arc<dyn ObjectLister>,
        bucket: &str,
        prefix: &str,
        output: mpsc::Sender<String>,
    ) -> WalkStats {
        let mut stats = WalkStats::new(bucket);

        info!(
            bucket = %bucket,
            prefix = %prefix,
            concurrency = self.concurrency,
            "Walking bucket"
        );

        let task = Arc::new(WalkTask {
            bucket: bucket.to_string(),
            delimiter: self.delimiter.clone(),
            lister,
            exclusions: Arc::clone(&self.exclusions),
            limiter: Arc::clone(&self.limiter),
            cache: self.cache.clone(),
            output,
            counters: Counters::default(),
        });

        walk_prefix(Arc::clone(&task), prefix.to_string()).await;

        task.counters.fill(&mut stats);
        drop(task);
        stats.complete();

        info!(
            bucket = %bucket,
            prefixes = stats.prefixes_listed,
            files = stats.files_emitted,
            excluded = stats.files_excluded,
            skipped = stats.files_skipped,
            errors = stats.error_count(),
            "Walk complete"
        );

        stats
    }
}

/// State shared by every task of one walk.
struct WalkTask {
    bucket: String,
    delimiter: String,
    lister: Arc<dyn ObjectLister>,
    exclusions: Arc<ExclusionSet>,
    limiter: Arc<Semaphore>,
    cache: Option<Arc<TraversalCache>>,
    output: mpsc::Sender<String>,
    counters: Counters,
}

#[derive(Default)]
struct Counters {
    prefixes_listed: AtomicUsize,
    pages_listed: AtomicUsize,
    files_emitted: AtomicUsize,
    files_excluded: AtomicUsize,
    files_skipped: AtomicUsize,
    dirs_excluded: AtomicUsize,
    cache_hits: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
    errors: Mutex<Vec<String>>,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn fill(&self, stats: &mut WalkStats) {
        stats.prefixes_listed = self.prefixes_listed.load(Ordering::Relaxed);
        stats.pages_listed = self.pages_listed.load(Ordering::Relaxed);
        stats.files_emitted = self.files_emitted.load(Ordering::Relaxed);
        stats.files_excluded = self.files_excluded.load(Ordering::Relaxed);
        stats.files_skipped = self.files_skipped.load(Ordering::Relaxed);
        stats.dirs_excluded = self.dirs_excluded.load(Ordering::Relaxed);
        stats.cache_hits = self.cache_hits.load(Ordering::Relaxed);
        stats.peak_active = self.peak_active.load(Ordering::SeqCst);
        for error in self.errors.lock().drain(..) {
            stats.record_error(error);
        }
    }
}

/// Tracks units currently holding a slot.
struct Active<'a>(&'a Counters);

impl<'a> Active<'a> {
    fn enter(counters: &'a Counters) -> Self {
        let now = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_active.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for Active<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Walk one prefix and, transitively, everything beneath it.
fn walk_prefix(task: Arc<WalkTask>, prefix: String) -> BoxFuture<'static, ()> {
    async move {
        let children = task.list_prefix(&prefix).await;

        for result in join_all(children).await {
            if let Err(e) = result {
                warn!(bucket = %task.bucket, prefix = %prefix, error = %e, "Child walk task failed");
                task.record_error(format!("{prefix}: child task failed: {e}"));
            }
        }
    }
    .boxed()
}

impl WalkTask {
    /// List every page of `prefix` while holding a slot.
    ///
    /// Returns the handles of the child tasks spawned along the way.
    async fn list_prefix(self: &Arc<Self>, prefix: &str) -> Vec<JoinHandle<()>> {
        let key = cache_key(&self.bucket, prefix);
        let skip_files = self.cache.as_ref().is_some_and(|c| c.contains(&key));
        if skip_files {
            Counters::bump(&self.counters.cache_hits);
            debug!(bucket = %self.bucket, prefix = %prefix, "Prefix already complete, not emitting its files");
        }

        let permit = match Arc::clone(&self.limiter).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(bucket = %self.bucket, prefix = %prefix, error = %e, "Concurrency limiter closed");
                self.record_error(format!("{prefix}: {e}"));
                return Vec::new();
            }
        };
        let active = Active::enter(&self.counters);
        Counters::bump(&self.counters.prefixes_listed);

        let mut children = Vec::new();
        let completed = self.list_pages(prefix, skip_files, &mut children).await;

        drop(active);
        drop(permit);

        if completed && let Some(cache) = &self.cache {
            cache.set(key, COMPLETE_MARKER);
        }

        children
    }

    /// Consume all pages of `prefix`. Returns false if the prefix was abandoned.
    async fn list_pages(
        self: &Arc<Self>,
        prefix: &str,
        skip_files: bool,
        children: &mut Vec<JoinHandle<()>>,
    ) -> bool {
        let mut marker: Option<String> = None;

        loop {
            let page = match self
                .lister
                .list_page(&self.bucket, prefix, &self.delimiter, marker.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    error!(bucket = %self.bucket, prefix = %prefix, error = %e, "Failed to list prefix");
                    self.record_error(format!("{prefix}: {e}"));
                    return false;
                }
            };
            Counters::bump(&self.counters.pages_listed);

            for child in page.prefixes {
                if self.exclusions.should_exclude_dir(&child) {
                    info!(bucket = %self.bucket, prefix = %child, "Skipping excluded directory");
                    Counters::bump(&self.counters.dirs_excluded);
                    continue;
                }

                debug!(bucket = %self.bucket, prefix = %child, "Found directory");
                children.push(tokio::spawn(walk_prefix(Arc::clone(self), child)));
            }

            for key in page.keys {
                if key == prefix {
                    continue;
                }
                if skip_files {
                    Counters::bump(&self.counters.files_skipped);
                    continue;
                }
                if self
                    .exclusions
                    .should_exclude_file(file_name(&key, &self.delimiter))
                {
                    Counters::bump(&self.counters.files_excluded);
                    continue;
                }

                debug!(bucket = %self.bucket, key = %key, "Found file");
                if self.output.send(key).await.is_err() {
                    warn!(bucket = %self.bucket, prefix = %prefix, "Output channel closed, abandoning prefix");
                    self.record_error(format!("{prefix}: output channel closed"));
                    return false;
                }
                Counters::bump(&self.counters.files_emitted);
            }

            if !page.truncated {
                return true;
            }

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => {
                    warn!(bucket = %self.bucket, prefix = %prefix, "Truncated listing without a continuation marker");
                    return true;
                }
            }
        }
    }

    fn record_error(&self, error: String) {
        self.counters.errors.lock().push(error);
    }
}
