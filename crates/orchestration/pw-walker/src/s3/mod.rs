//! S3 adapters.
//!
//! This module connects the walker to S3-compatible stores:
//! - Client configuration with LocalStack/MinIO support and per-bucket regions
//! - `ListObjectsV2` listing with retry
//! - Bucket discovery through `ListBuckets` and `GetBucketLocation`

mod client;
mod discovery;
mod lister;
mod retry;

pub use client::{DEFAULT_REGION, S3Config, create_s3_client, normalize_location};
pub use discovery::{S3BucketDiscovery, S3ListerFactory};
pub use lister::S3Lister;
pub use retry::{RetryConfig, with_retry};
