//! S3 walker integration tests using LocalStack.
//!
//! These tests verify listing, walking, caching and bucket discovery against
//! a real S3 API (via LocalStack).

use crate::common::{CollectingSink, LocalStackTestContext};
use pw_walker::s3::{S3BucketDiscovery, S3Lister, S3ListerFactory, create_s3_client};
use pw_walker::{
    BucketInfo, BucketOutcome, ObjectLister, TraversalCache, WalkConfig, Walker, cache_key,
    discover_buckets, run_buckets, select_buckets,
};
use std::sync::Arc;
use tokio::sync::mpsc;

const DOCS_KEYS: &[&str] = &[
    "readme.md",
    "img/a.png",
    "img/b.txt",
    "img/temp/x.txt",
    "notes/2024/jan.txt",
];

async fn lister(ctx: &LocalStackTestContext) -> Arc<dyn ObjectLister> {
    let config = ctx.s3_config();
    let client = create_s3_client(&config).await.unwrap();
    Arc::new(S3Lister::new(client, config.retry.clone()))
}

async fn walk_keys(
    walker: &Walker,
    lister: Arc<dyn ObjectLister>,
    bucket: &str,
    prefix: &str,
) -> (Vec<String>, pw_walker::WalkStats) {
    let (tx, mut rx) = mpsc::channel(64);
    let walk = walker.walk(lister, bucket, prefix, tx);
    let drain = async {
        let mut keys = Vec::new();
        while let Some(key) = rx.recv().await {
            keys.push(key);
        }
        keys
    };
    let (stats, mut keys) = tokio::join!(walk, drain);
    keys.sort();
    (keys, stats)
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_s3_lister_groups_on_delimiter() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let bucket = "pw-test-listing";
    ctx.seed_bucket(bucket, DOCS_KEYS).await.unwrap();

    let lister = lister(&ctx).await;
    let page = lister.list_page(bucket, "", "/", None).await.unwrap();

    assert_eq!(page.prefixes, vec!["img/", "notes/"]);
    assert_eq!(page.keys, vec!["readme.md"]);
    assert!(!page.truncated);
    assert!(page.next_marker.is_none());

    let page = lister.list_page(bucket, "img/", "/", None).await.unwrap();
    assert_eq!(page.prefixes, vec!["img/temp/"]);
    assert_eq!(page.keys, vec!["img/a.png", "img/b.txt"]);
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_s3_lister_missing_bucket_fails() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let lister = lister(&ctx).await;
    let result = lister
        .list_page("pw-test-does-not-exist", "", "/", None)
        .await;

    assert!(result.is_err());
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_walk_with_exclusions_and_cache() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let bucket = "pw-test-walk";
    ctx.seed_bucket(bucket, DOCS_KEYS).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(TraversalCache::open(dir.path().join("walk.cache")));
    let config = WalkConfig::new()
        .with_concurrency(4)
        .with_excluded_extensions(["png"])
        .with_excluded_keywords(["temp"]);
    let walker = Walker::new(&config, Some(cache.clone()));

    let (keys, stats) = walk_keys(&walker, lister(&ctx).await, bucket, "").await;

    assert_eq!(keys, vec!["img/b.txt", "notes/2024/jan.txt", "readme.md"]);
    assert!(!stats.has_errors());
    assert_eq!(stats.files_excluded, 1);
    assert_eq!(stats.dirs_excluded, 1);
    assert!(cache.contains(&cache_key(bucket, "img/")));
    assert!(cache.contains(&cache_key(bucket, "")));

    // A new file under a finished prefix is not emitted on re-run
    ctx.put_object(bucket, "img/new.txt").await.unwrap();
    let (keys, stats) = walk_keys(&walker, lister(&ctx).await, bucket, "").await;
    assert!(!keys.contains(&"img/new.txt".to_string()));
    assert!(stats.cache_hits > 0);

    // Until its cache entry is cleared
    cache.remove(&cache_key(bucket, "img/"));
    cache.remove(&cache_key(bucket, ""));
    let (keys, _) = walk_keys(&walker, lister(&ctx).await, bucket, "").await;
    assert!(keys.contains(&"img/new.txt".to_string()));
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_discover_and_run_buckets() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let bucket = "pw-test-run";
    ctx.seed_bucket(bucket, &["a.txt", "logs/b.log"]).await.unwrap();

    let s3_config = ctx.s3_config();
    let client = create_s3_client(&s3_config).await.unwrap();
    let discovery = S3BucketDiscovery::new(client, s3_config.retry.clone());

    let dir = tempfile::tempdir().unwrap();
    let cache = TraversalCache::open(dir.path().join("walk.cache"));
    let discovered = discover_buckets(&discovery, Some(&cache), "localstack").await;
    let buckets = select_buckets(discovered, Some(bucket)).unwrap();

    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].name, bucket);
    assert_eq!(buckets[0].location.as_deref(), Some("us-east-1"));

    let walker = Walker::new(&WalkConfig::new(), None);
    let factory = S3ListerFactory::new(s3_config);
    let sink = CollectingSink::new();
    let missing = BucketInfo::new("pw-test-run-missing");

    let summary = run_buckets(
        &walker,
        &factory,
        &[buckets[0].clone(), missing],
        "",
        &sink,
        16,
    )
    .await;

    assert_eq!(sink.keys_for(bucket), vec!["a.txt", "logs/b.log"]);
    assert_eq!(sink.finish_count(), 1);
    assert_eq!(summary.total_emitted(), 2);

    match &summary.outcomes["pw-test-run-missing"] {
        BucketOutcome::Walked(stats) => assert!(stats.has_errors()),
        BucketOutcome::Skipped { .. } => panic!("listing errors are recorded, not skipped"),
    }
    assert!(summary.has_errors());
}
