//! LocalStack test context and utilities.

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use parking_lot::Mutex;
use pw_error::Result;
use pw_walker::Sink;
use pw_walker::s3::S3Config;

/// LocalStack test context providing an S3 client.
pub struct LocalStackTestContext {
    pub s3: S3Client,
    pub endpoint: String,
    pub region: String,
}

impl LocalStackTestContext {
    /// Create a new LocalStack test context.
    ///
    /// Uses the `LOCALSTACK_ENDPOINT` environment variable if set,
    /// otherwise defaults to `http://localhost:4566`.
    pub async fn new() -> Self {
        let endpoint = std::env::var("LOCALSTACK_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:4566".to_string());
        let region = "us-east-1".to_string();

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region.clone()))
            .endpoint_url(&endpoint)
            .credentials_provider(aws_sdk_s3::config::Credentials::new(
                "test", "test", None, None, "localstack",
            ))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(true)
            .build();

        Self {
            s3: S3Client::from_conf(s3_config),
            endpoint,
            region,
        }
    }

    /// Walker-side S3 configuration pointing at LocalStack.
    pub fn s3_config(&self) -> S3Config {
        S3Config::new()
            .with_endpoint(&self.endpoint)
            .with_region(&self.region)
            .with_credentials("test", "test")
    }

    /// Check if LocalStack is available and healthy.
    pub async fn is_available(&self) -> bool {
        // Fails quickly if LocalStack isn't running
        self.s3.list_buckets().send().await.is_ok()
    }

    /// Create an S3 bucket for testing.
    pub async fn create_bucket(&self, name: &str) -> std::result::Result<(), aws_sdk_s3::Error> {
        let buckets = self.s3.list_buckets().send().await?;
        let exists = buckets
            .buckets()
            .iter()
            .any(|b| b.name().unwrap_or_default() == name);

        if !exists {
            self.s3.create_bucket().bucket(name).send().await?;
        }
        Ok(())
    }

    /// Create a bucket and fill it with small objects at `keys`.
    pub async fn seed_bucket(
        &self,
        bucket: &str,
        keys: &[&str],
    ) -> std::result::Result<(), aws_sdk_s3::Error> {
        self.create_bucket(bucket).await?;
        self.empty_bucket(bucket).await?;
        for key in keys {
            self.put_object(bucket, key).await?;
        }
        Ok(())
    }

    /// Upload a small object.
    pub async fn put_object(&self, bucket: &str, key: &str) -> std::result::Result<(), aws_sdk_s3::Error> {
        self.s3
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(key.as_bytes().to_vec().into())
            .send()
            .await?;
        Ok(())
    }

    /// Delete every object in `bucket`.
    pub async fn empty_bucket(&self, bucket: &str) -> std::result::Result<(), aws_sdk_s3::Error> {
        let mut token: Option<String> = None;
        loop {
            let mut request = self.s3.list_objects_v2().bucket(bucket);
            if let Some(t) = &token {
                request = request.continuation_token(t);
            }
            let result = request.send().await?;

            for object in result.contents() {
                if let Some(key) = object.key() {
                    self.s3.delete_object().bucket(bucket).key(key).send().await?;
                }
            }

            match result.next_continuation_token() {
                Some(t) if result.is_truncated().unwrap_or(false) => token = Some(t.to_string()),
                _ => break,
            }
        }
        Ok(())
    }
}

/// Sink that stores `bucket/key` pairs for verification.
#[derive(Default)]
pub struct CollectingSink {
    keys: Mutex<Vec<(String, String)>>,
    finished: Mutex<usize>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted keys written for `bucket`.
    pub fn keys_for(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .keys
            .lock()
            .iter()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn finish_count(&self) -> usize {
        *self.finished.lock()
    }
}

#[async_trait]
impl Sink for CollectingSink {
    async fn write(&self, bucket: &str, key: &str) -> Result<()> {
        self.keys.lock().push((bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        *self.finished.lock() += 1;
        Ok(())
    }
}
