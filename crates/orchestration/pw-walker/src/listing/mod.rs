//! Listing backends.
//!
//! This module defines the [`ObjectLister`] trait consumed by the walker and
//! the [`ListerFactory`] used by the multi-bucket runner. Implementations:
//! - [`crate::s3::S3Lister`] - `ListObjectsV2` against S3-compatible stores
//! - [`MemoryStore`] - in-process store for tests and local development

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use pw_error::Result;
use std::sync::Arc;

use crate::discovery::BucketInfo;

/// One page of a hierarchical listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Child prefixes ("directories"), in listing order
    pub prefixes: Vec<String>,

    /// Object keys ("files") directly under the listed prefix
    pub keys: Vec<String>,

    /// Marker to pass for the next page, if any
    pub next_marker: Option<String>,

    /// Whether more pages follow
    pub truncated: bool,
}

/// Trait for paginated, delimiter-aware listing of a bucket.
///
/// Implementations must group keys on `delimiter` into common prefixes the
/// way S3's `ListObjectsV2` does, and resume strictly after `marker`.
#[async_trait]
pub trait ObjectLister: Send + Sync {
    /// List one page of `bucket` under `prefix`.
    ///
    /// An empty `prefix` lists from the bucket root. `marker` is `None` for
    /// the first page and the previous page's `next_marker` afterwards.
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
        marker: Option<&str>,
    ) -> Result<ListingPage>;
}

/// Builds the lister used to walk a particular bucket.
///
/// Object stores often require a client bound to the bucket's region, so the
/// runner asks for a lister per bucket.
#[async_trait]
pub trait ListerFactory: Send + Sync {
    /// Create a lister for `bucket`.
    async fn lister_for(&self, bucket: &BucketInfo) -> Result<Arc<dyn ObjectLister>>;
}
