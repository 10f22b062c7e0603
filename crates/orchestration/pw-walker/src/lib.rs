//! pw-walker - concurrent, resumable prefix walking for object stores.
//!
//! This crate turns a flat, paginated key listing into a directory-tree
//! traversal. It supports:
//!
//! - Recursive prefix/delimiter walking with a global concurrency limit
//! - Extension and path-segment exclusion rules
//! - A persisted traversal cache so re-runs skip already-emitted files
//! - S3 listing and bucket discovery with LocalStack/MinIO support
//! - Output to line-oriented files (text/JSONL) or rendered trees (text/JSON)
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pw_walker::{TraversalCache, WalkConfig, Walker};
//! use pw_walker::s3::{S3Config, S3Lister, create_s3_client};
//!
//! let s3_config = S3Config::new().with_region("eu-west-1");
//! let client = create_s3_client(&s3_config).await?;
//! let lister = Arc::new(S3Lister::new(client, s3_config.retry.clone()));
//!
//! let cache = Arc::new(TraversalCache::open("prefixwalk.cache"));
//! let config = WalkConfig::new()
//!     .with_concurrency(8)
//!     .with_excluded_extensions(["mp4", "png"]);
//! let walker = Walker::new(&config, Some(cache.clone()));
//!
//! let (tx, mut rx) = tokio::sync::mpsc::channel(config.channel_capacity);
//! let walk = walker.walk(lister, "my-bucket", "", tx);
//! let drain = async { while let Some(key) = rx.recv().await { println!("{key}"); } };
//! let (stats, ()) = tokio::join!(walk, drain);
//!
//! cache.sync()?;
//! eprintln!("Emitted {} keys", stats.files_emitted);
//! ```

pub mod cache;
pub mod config;
pub mod discovery;
pub mod exclude;
pub mod listing;
pub mod output;
pub mod runner;
pub mod s3;
pub mod stats;
pub mod walker;

pub use cache::{COMPLETE_MARKER, TraversalCache, cache_key, credential_fingerprint};
pub use config::WalkConfig;
pub use discovery::{BucketDiscovery, BucketInfo, discover_buckets, select_buckets};
pub use exclude::{ExclusionSet, NO_EXTENSION};
pub use listing::{ListerFactory, ListingPage, MemoryStore, ObjectLister};
pub use output::{LineSink, MultiSink, OutputFormat, Sink, TreeNode, TreeSink};
pub use runner::run_buckets;
pub use stats::{BucketOutcome, RunSummary, WalkStats};
pub use walker::Walker;
