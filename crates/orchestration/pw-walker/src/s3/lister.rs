//! `ListObjectsV2` listing.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
use pw_error::{ListingError, PwError, Result};
use tracing::trace;

use super::retry::{RetryConfig, with_retry};
use crate::listing::{ListingPage, ObjectLister};

/// Lists S3 prefixes one page at a time.
///
/// The continuation token is used as the page marker.
#[derive(Debug, Clone)]
pub struct S3Lister {
    client: Client,
    retry: RetryConfig,
}

impl S3Lister {
    /// Create a lister from a client and retry policy.
    pub fn new(client: Client, retry: RetryConfig) -> Self {
        Self { client, retry }
    }
}

#[async_trait]
impl ObjectLister for S3Lister {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
        marker: Option<&str>,
    ) -> Result<ListingPage> {
        with_retry(&self.retry, "list_objects_v2", move || async move {
            let mut req = self.client.list_objects_v2().bucket(bucket);

            if !delimiter.is_empty() {
                req = req.delimiter(delimiter);
            }
            if !prefix.is_empty() {
                req = req.prefix(prefix);
            }
            if let Some(token) = marker {
                req = req.continuation_token(token);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| PwError::from(listing_error(&e)))?;

            Ok(into_page(resp))
        })
        .await
    }
}

/// Map an SDK error to a [`ListingError`], preferring the service error code.
pub(super) fn listing_error<E>(error: &E) -> ListingError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    ListingError::from_code(error.code(), DisplayErrorContext(error).to_string())
}

fn into_page(resp: ListObjectsV2Output) -> ListingPage {
    let prefixes: Vec<String> = resp
        .common_prefixes()
        .iter()
        .filter_map(|cp| cp.prefix().map(str::to_string))
        .collect();
    let keys: Vec<String> = resp
        .contents()
        .iter()
        .filter_map(|obj| obj.key().map(str::to_string))
        .collect();
    let truncated = resp.is_truncated().unwrap_or(false);
    let next_marker = resp.next_continuation_token().map(str::to_string);

    trace!(
        prefixes = prefixes.len(),
        keys = keys.len(),
        truncated,
        "Listed page"
    );

    ListingPage {
        prefixes,
        keys,
        next_marker,
        truncated,
    }
}
