//! Main execution logic for prefixwalk CLI.

use anyhow::{Context, Result};
use pw_walker::cache::default_cache_path;
use pw_walker::s3::{RetryConfig, S3BucketDiscovery, S3Config, S3ListerFactory, create_s3_client};
use pw_walker::{
    LineSink, MultiSink, RunSummary, Sink, TraversalCache, TreeSink, WalkConfig, Walker,
    credential_fingerprint, discover_buckets, run_buckets, select_buckets,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::args::Cli;
use crate::progress::ProgressReporter;

/// Execute a walk with the provided arguments.
pub async fn execute(args: Cli) -> Result<RunSummary> {
    let s3_config = build_s3_config(&args);
    let walk_config = build_walk_config(&args);
    let fingerprint = credential_fingerprint(&s3_config.identity());

    let cache = open_cache(&args, &fingerprint)?;

    let client = create_s3_client(&s3_config).await?;
    let discovery = S3BucketDiscovery::new(client, s3_config.retry.clone());
    let discovered = discover_buckets(&discovery, cache.as_deref(), &fingerprint).await;
    let buckets = select_buckets(discovered, args.bucket.as_deref())?;

    info!(
        buckets = buckets.len(),
        prefix = %args.prefix,
        workers = walk_config.effective_concurrency(),
        "Starting walk"
    );

    let walker = Walker::new(&walk_config, cache.clone());
    let exclusions = walker.exclusions();
    if !exclusions.is_empty() {
        info!(
            extensions = ?exclusions.extensions(),
            keywords = ?exclusions.keywords(),
            "Exclusion rules"
        );
    }

    let mut progress = ProgressReporter::new(args.progress, args.progress_interval);
    let sink = progress.counting(build_sink(&args, &walk_config.delimiter)?);
    progress.start();

    let factory = S3ListerFactory::new(s3_config);
    let summary = run_buckets(
        &walker,
        &factory,
        &buckets,
        &args.prefix,
        &sink,
        walk_config.channel_capacity,
    )
    .await;

    progress.stop().await;

    if let Some(cache) = &cache {
        match cache.sync() {
            Ok(()) => info!(path = %cache.path().display(), entries = cache.len(), "Saved traversal cache"),
            Err(e) => warn!(path = %cache.path().display(), error = %e, "Failed to save traversal cache"),
        }
    }

    Ok(summary)
}

/// Build the S3 configuration from CLI arguments.
fn build_s3_config(args: &Cli) -> S3Config {
    let mut config = S3Config::new()
        .with_region(&args.region)
        .with_retry(RetryConfig::new().with_max_retries(args.max_retries));

    if let Some(endpoint) = &args.endpoint {
        config = config.with_endpoint(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) = (&args.access_key, &args.secret_key) {
        config = config.with_credentials(access_key, secret_key);
        if let Some(token) = &args.session_token {
            config = config.with_session_token(token);
        }
    }

    if let Some(profile) = &args.profile {
        config = config.with_profile(profile);
    }

    config
}

/// Build the walk configuration from CLI arguments.
fn build_walk_config(args: &Cli) -> WalkConfig {
    if args.workers == 0 {
        warn!("--workers 0 is not valid, using 1");
    }

    let mut config = WalkConfig::new()
        .with_concurrency(args.workers)
        .with_excluded_extensions(&args.exclude_exts)
        .with_excluded_keywords(&args.exclude_keys);

    if args.default_exclude_exts {
        config = config.with_default_excluded_extensions();
    }
    if args.default_exclude_keys {
        config = config.with_default_excluded_keywords();
    }

    config
}

/// Resolve the cache file, or `None` when caching is disabled.
fn cache_path(args: &Cli, fingerprint: &str) -> Option<PathBuf> {
    if args.no_cache {
        return None;
    }
    Some(
        args.cache_file
            .clone()
            .unwrap_or_else(|| default_cache_path(fingerprint)),
    )
}

fn open_cache(args: &Cli, fingerprint: &str) -> Result<Option<Arc<TraversalCache>>> {
    let Some(path) = cache_path(args, fingerprint) else {
        info!("Traversal cache disabled");
        return Ok(None);
    };

    let cache = TraversalCache::open(&path);
    if args.clear_cache {
        cache
            .clear()
            .with_context(|| format!("Failed to clear cache {}", path.display()))?;
        info!(path = %path.display(), "Cleared traversal cache");
    } else {
        info!(path = %path.display(), entries = cache.len(), "Loaded traversal cache");
    }

    Ok(Some(Arc::new(cache)))
}

/// Build the output sink: the line file plus an optional tree renderer.
fn build_sink(args: &Cli, delimiter: &str) -> Result<Arc<dyn Sink>> {
    let format = args.format.into();
    let lines = if args.output == "-" {
        LineSink::stdout(format)
    } else {
        LineSink::create(&args.output, format)?
    };

    if args.tree.is_none() && args.json.is_none() {
        return Ok(Arc::new(lines));
    }

    let mut tree = TreeSink::new(delimiter);
    if let Some(path) = &args.tree {
        tree = tree.with_text_path(path);
    }
    if let Some(path) = &args.json {
        tree = tree.with_json_path(path);
    }

    Ok(Arc::new(
        MultiSink::new()
            .with_sink(Arc::new(lines))
            .with_sink(Arc::new(tree)),
    ))
}
