//! Multi-bucket runs.

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::discovery::BucketInfo;
use crate::listing::ListerFactory;
use crate::output::Sink;
use crate::stats::{BucketOutcome, RunSummary};
use crate::walker::Walker;

/// Walk `buckets` one after another from `prefix`, feeding every key to `sink`.
///
/// Each bucket gets its own lister from `factory` and its own channel of
/// `channel_capacity` keys, drained into the sink while the walk runs. A
/// bucket whose lister cannot be built is recorded as skipped and the run
/// moves on. `sink.finish()` is called once, after the last bucket.
pub async fn run_buckets(
    walker: &Walker,
    factory: &dyn ListerFactory,
    buckets: &[BucketInfo],
    prefix: &str,
    sink: &dyn Sink,
    channel_capacity: usize,
) -> RunSummary {
    let mut summary = RunSummary::new();

    for (index, bucket) in buckets.iter().enumerate() {
        info!(
            bucket = %bucket.name,
            location = bucket.location.as_deref().unwrap_or("-"),
            index = index + 1,
            total = buckets.len(),
            "Processing bucket"
        );

        let lister = match factory.lister_for(bucket).await {
            Ok(lister) => lister,
            Err(e) => {
                error!(bucket = %bucket.name, error = %e, "Failed to create lister, skipping bucket");
                summary.record(
                    bucket.name.clone(),
                    BucketOutcome::Skipped {
                        reason: e.to_string(),
                    },
                );
                continue;
            }
        };

        let (tx, mut rx) = mpsc::channel::<String>(channel_capacity.max(1));

        let walk = walker.walk(lister, &bucket.name, prefix, tx);
        let drain = async {
            let mut failures = 0usize;
            while let Some(key) = rx.recv().await {
                if let Err(e) = sink.write(&bucket.name, &key).await {
                    failures += 1;
                    if failures == 1 {
                        warn!(bucket = %bucket.name, key = %key, error = %e, "Failed to write key");
                    }
                }
            }
            failures
        };

        let (mut stats, failures) = tokio::join!(walk, drain);
        if failures > 0 {
            stats.record_error(format!("{failures} keys could not be written to the output"));
        }

        summary.record(bucket.name.clone(), BucketOutcome::Walked(stats));
    }

    if let Err(e) = sink.finish().await {
        error!(error = %e, "Failed to finish output");
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TraversalCache;
    use crate::config::WalkConfig;
    use crate::listing::MemoryStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pw_error::{PwError, Result};
    use std::sync::Arc;

    #[derive(Default)]
    struct Collecting {
        keys: Mutex<Vec<(String, String)>>,
        finishes: Mutex<usize>,
        reject: Option<String>,
    }

    #[async_trait]
    impl Sink for Collecting {
        async fn write(&self, bucket: &str, key: &str) -> Result<()> {
            if self.reject.as_deref() == Some(key) {
                return Err(PwError::Output("rejected".to_string()));
            }
            self.keys.lock().push((bucket.to_string(), key.to_string()));
            Ok(())
        }

        async fn finish(&self) -> Result<()> {
            *self.finishes.lock() += 1;
            Ok(())
        }
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.put("docs", "readme.txt");
        store.put("docs", "img/a.txt");
        store.put("logs", "2024/app.log");
        store.put("media", "clip.mp4");
        store
    }

    #[tokio::test]
    async fn test_walks_every_bucket() {
        let store = store();
        let walker = Walker::new(&WalkConfig::new(), None);
        let sink = Collecting::default();
        let buckets = vec![BucketInfo::new("docs"), BucketInfo::new("logs")];

        let summary = run_buckets(&walker, &store, &buckets, "", &sink, 8).await;

        assert_eq!(summary.outcomes.len(), 2);
        assert_eq!(summary.total_emitted(), 3);
        assert!(!summary.has_errors());
        assert_eq!(*sink.finishes.lock(), 1);

        let mut keys = sink.keys.lock().clone();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ("docs".to_string(), "img/a.txt".to_string()),
                ("docs".to_string(), "readme.txt".to_string()),
                ("logs".to_string(), "2024/app.log".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_client_failure_skips_bucket() {
        let store = store();
        store.fail_client("logs");
        let walker = Walker::new(&WalkConfig::new(), None);
        let sink = Collecting::default();
        let buckets = vec![
            BucketInfo::new("logs"),
            BucketInfo::new("docs"),
            BucketInfo::new("media"),
        ];

        let summary = run_buckets(&walker, &store, &buckets, "", &sink, 8).await;

        assert!(matches!(
            summary.outcomes.get("logs"),
            Some(BucketOutcome::Skipped { .. })
        ));
        assert_eq!(summary.outcomes["docs"].stats().unwrap().files_emitted, 2);
        assert_eq!(summary.outcomes["media"].stats().unwrap().files_emitted, 1);
        assert!(summary.has_errors());
        assert_eq!(summary.total_errors(), 1);
    }

    #[tokio::test]
    async fn test_listing_failure_does_not_stop_run() {
        let store = store();
        store.fail_prefix("docs", "");
        let walker = Walker::new(&WalkConfig::new(), None);
        let sink = Collecting::default();
        let buckets = vec![BucketInfo::new("docs"), BucketInfo::new("logs")];

        let summary = run_buckets(&walker, &store, &buckets, "", &sink, 8).await;

        assert!(summary.outcomes["docs"].has_errors());
        assert!(!summary.outcomes["logs"].has_errors());
        assert_eq!(sink.keys.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_sink_errors_are_counted() {
        let store = store();
        let walker = Walker::new(&WalkConfig::new(), None);
        let sink = Collecting {
            reject: Some("readme.txt".to_string()),
            ..Default::default()
        };

        let summary =
            run_buckets(&walker, &store, &[BucketInfo::new("docs")], "", &sink, 1).await;

        let stats = summary.outcomes["docs"].stats().unwrap();
        assert_eq!(stats.files_emitted, 2);
        assert_eq!(stats.error_count(), 1);
        assert_eq!(sink.keys.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_second_run_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(TraversalCache::open(dir.path().join("walk.cache")));
        let store = store();
        let walker = Walker::new(&WalkConfig::new(), Some(cache.clone()));
        let buckets = vec![BucketInfo::new("docs"), BucketInfo::new("logs")];

        let first = Collecting::default();
        run_buckets(&walker, &store, &buckets, "", &first, 8).await;
        cache.sync().unwrap();

        let reopened = Arc::new(TraversalCache::open(dir.path().join("walk.cache")));
        let walker = Walker::new(&WalkConfig::new(), Some(reopened));
        let second = Collecting::default();
        let summary = run_buckets(&walker, &store, &buckets, "", &second, 8).await;

        assert_eq!(first.keys.lock().len(), 3);
        assert!(second.keys.lock().is_empty());
        assert_eq!(summary.total_emitted(), 0);
    }
}
