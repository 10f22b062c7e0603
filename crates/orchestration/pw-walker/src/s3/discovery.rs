//! S3 bucket discovery and per-bucket listers.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use parking_lot::Mutex;
use pw_error::{PwError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::client::{DEFAULT_REGION, S3Config, create_s3_client, normalize_location};
use super::lister::{S3Lister, listing_error};
use super::retry::{RetryConfig, with_retry};
use crate::discovery::{BucketDiscovery, BucketInfo};
use crate::listing::{ListerFactory, ObjectLister};

/// Discovers buckets with `ListBuckets` and resolves each one's region.
pub struct S3BucketDiscovery {
    client: Client,
    retry: RetryConfig,
}

impl S3BucketDiscovery {
    /// Create a discovery client.
    pub fn new(client: Client, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    async fn location(&self, bucket: &str) -> Option<String> {
        match self.client.get_bucket_location().bucket(bucket).send().await {
            Ok(resp) => {
                let constraint = resp
                    .location_constraint()
                    .map(|c| c.as_str())
                    .unwrap_or_default();
                Some(normalize_location(constraint))
            }
            Err(e) => {
                warn!(
                    bucket = %bucket,
                    error = %DisplayErrorContext(&e),
                    "Failed to get bucket location"
                );
                None
            }
        }
    }
}

#[async_trait]
impl BucketDiscovery for S3BucketDiscovery {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        let resp = with_retry(&self.retry, "list_buckets", move || async move {
            self.client
                .list_buckets()
                .send()
                .await
                .map_err(|e| PwError::from(listing_error(&e)))
        })
        .await
        .map_err(|e| PwError::Discovery(e.to_string()))?;

        let names: Vec<String> = resp
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect();

        let mut buckets = Vec::with_capacity(names.len());
        for name in names {
            let location = self.location(&name).await;
            debug!(bucket = %name, location = ?location, "Discovered bucket");
            buckets.push(BucketInfo { name, location });
        }

        Ok(buckets)
    }
}

/// Builds an [`S3Lister`] bound to each bucket's region.
///
/// Clients are reused for buckets in the same region.
pub struct S3ListerFactory {
    config: S3Config,
    clients: Mutex<HashMap<String, Client>>,
}

impl S3ListerFactory {
    /// Create a factory from the base configuration.
    pub fn new(config: S3Config) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ListerFactory for S3ListerFactory {
    async fn lister_for(&self, bucket: &BucketInfo) -> Result<Arc<dyn ObjectLister>> {
        let config = self.config.for_bucket(bucket);
        let region = config
            .region
            .clone()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let cached = self.clients.lock().get(&region).cloned();
        let client = match cached {
            Some(client) => client,
            None => {
                debug!(region = %region, "Creating S3 client");
                let client = create_s3_client(&config).await?;
                self.clients.lock().insert(region, client.clone());
                client
            }
        };

        Ok(Arc::new(S3Lister::new(client, config.retry.clone())))
    }
}
