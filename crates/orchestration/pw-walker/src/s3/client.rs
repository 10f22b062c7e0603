//! S3 client configuration and creation.

use aws_config::BehaviorVersion;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::Client;
use pw_error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use super::retry::RetryConfig;
use crate::discovery::BucketInfo;

/// Region used when neither the bucket nor the configuration names one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Configuration for S3 access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// AWS region
    pub region: Option<String>,

    /// Custom endpoint URL (LocalStack, MinIO)
    pub endpoint: Option<String>,

    /// Explicit AWS access key (optional)
    pub access_key: Option<String>,

    /// Explicit AWS secret key (optional)
    pub secret_key: Option<String>,

    /// Session token for temporary credentials (optional)
    pub session_token: Option<String>,

    /// AWS profile name (optional)
    pub profile: Option<String>,

    /// Per-operation timeout in seconds
    pub timeout_secs: u64,

    /// Retry behaviour for listing calls
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            access_key: None,
            secret_key: None,
            session_token: None,
            profile: None,
            timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl S3Config {
    /// Create a new S3Config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom endpoint (for LocalStack or MinIO).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the AWS region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set explicit credentials.
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Set a session token for temporary credentials.
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Set the AWS profile.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Set the per-operation timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Configuration for talking to `bucket`, using its location as the region.
    pub fn for_bucket(&self, bucket: &BucketInfo) -> Self {
        let mut config = self.clone();
        match bucket.location.as_deref() {
            Some(location) => config.region = Some(normalize_location(location)),
            None => {
                let region = self.region.as_deref().unwrap_or(DEFAULT_REGION);
                warn!(bucket = %bucket.name, region = %region, "Bucket location unknown, using configured region");
            }
        }
        config
    }

    /// String identifying the credentials and endpoint in use.
    ///
    /// Secrets are only ever hashed into a fingerprint, never logged.
    pub fn identity(&self) -> String {
        let principal = match (&self.access_key, &self.secret_key, &self.profile) {
            (Some(access_key), Some(secret_key), _) => format!("{access_key}:{secret_key}"),
            (_, _, Some(profile)) => format!("profile:{profile}"),
            _ => "default".to_string(),
        };
        match &self.endpoint {
            Some(endpoint) => format!("{principal}@{endpoint}"),
            None => principal,
        }
    }
}

/// Map an S3 location constraint to a region name.
///
/// S3 reports buckets in `us-east-1` with an empty constraint and old
/// `eu-west-1` buckets as `EU`.
pub fn normalize_location(location: &str) -> String {
    match location.trim() {
        "" => DEFAULT_REGION.to_string(),
        "EU" => "eu-west-1".to_string(),
        other => other.to_string(),
    }
}

/// Create an S3 client from configuration.
pub async fn create_s3_client(config: &S3Config) -> Result<Client> {
    use aws_config::Region;

    let mut aws_config_loader = aws_config::defaults(BehaviorVersion::latest());

    let region = config
        .region
        .clone()
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    aws_config_loader = aws_config_loader.region(Region::new(region));

    // Custom endpoint (LocalStack, MinIO)
    if let Some(endpoint) = &config.endpoint {
        aws_config_loader = aws_config_loader.endpoint_url(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key,
            secret_key,
            config.session_token.clone(),
            None,
            "prefixwalk",
        );
        aws_config_loader = aws_config_loader.credentials_provider(credentials);
    }

    if let Some(profile) = &config.profile {
        aws_config_loader = aws_config_loader.profile_name(profile);
    }

    if config.timeout_secs > 0 {
        aws_config_loader = aws_config_loader.timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(Duration::from_secs(config.timeout_secs))
                .build(),
        );
    }

    let aws_config = aws_config_loader.load().await;

    let s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);

    // Custom endpoints rarely support virtual-hosted buckets
    let s3_config = if config.endpoint.is_some() {
        s3_config_builder.force_path_style(true).build()
    } else {
        s3_config_builder.build()
    };

    Ok(Client::from_conf(s3_config))
}
