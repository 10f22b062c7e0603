//! Error types and classification for prefixwalk.
//!
//! This crate provides:
//! - [`PwError`] - Top-level error enum for every walker operation
//! - Domain-specific errors ([`ListingError`], [`CacheError`])
//! - [`ErrorCategory`] for retry decisions on listing calls

use thiserror::Error;

/// Top-level error type for prefixwalk.
#[derive(Error, Debug)]
pub enum PwError {
    /// Listing a prefix in a bucket failed
    #[error("Listing error: {0}")]
    Listing(#[from] ListingError),

    /// Enumerating the buckets of the account failed
    #[error("Bucket discovery error: {0}")]
    Discovery(String),

    /// Traversal cache persistence failed
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Writing discovered keys to a sink failed
    #[error("Output error: {0}")]
    Output(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors (wrapped anyhow)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors returned by a listing backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListingError {
    /// Credentials lack permission for the bucket or prefix
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The bucket does not exist (or lives behind another endpoint)
    #[error("No such bucket: {0}")]
    NoSuchBucket(String),

    /// The service asked us to slow down
    #[error("Throttled: {0}")]
    Throttled(String),

    /// Network, timeout or server-side failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ListingError {
    /// Build a listing error from a service error code and its message.
    ///
    /// Falls back to [`from_message`](Self::from_message) when the code is
    /// missing or unknown.
    pub fn from_code(code: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            Some("SlowDown" | "Throttling" | "ThrottlingException" | "TooManyRequests"
                | "RequestLimitExceeded") => Self::Throttled(message),
            Some("InternalError" | "ServiceUnavailable" | "RequestTimeout"
                | "RequestTimeTooSkewed") => Self::Transport(message),
            Some("AccessDenied" | "Forbidden" | "InvalidAccessKeyId"
                | "SignatureDoesNotMatch" | "AllAccessDisabled") => Self::AccessDenied(message),
            Some("NoSuchBucket" | "NotFound") => Self::NoSuchBucket(message),
            _ => Self::from_message(message),
        }
    }

    /// Build a listing error from a provider error message.
    ///
    /// Object store SDKs surface the service error code inside the rendered
    /// message (`(AccessDenied)`, `(SlowDown)`, HTTP status codes) next to
    /// request IDs. Retryable markers are checked first, and status codes
    /// only match as whole tokens so IDs like `8H40318ZQ` do not count.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let status = |code: &str| {
            lower
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|token| token == code)
        };

        if lower.contains("slowdown")
            || lower.contains("toomanyrequests")
            || lower.contains("throttl")
            || status("429")
        {
            Self::Throttled(message)
        } else if lower.contains("serviceunavailable")
            || lower.contains("internalerror")
            || lower.contains("requesttimeout")
            || lower.contains("timed out")
            || lower.contains("timeout")
            || ["500", "502", "503", "504"].into_iter().any(status)
        {
            Self::Transport(message)
        } else if lower.contains("accessdenied")
            || lower.contains("access denied")
            || lower.contains("forbidden")
            || lower.contains("invalidaccesskeyid")
            || lower.contains("signaturedoesnotmatch")
            || status("403")
        {
            Self::AccessDenied(message)
        } else if lower.contains("nosuchbucket") || status("404") {
            Self::NoSuchBucket(message)
        } else {
            Self::Transport(message)
        }
    }
}

/// Errors raised while loading or persisting the traversal cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Reading, writing or removing the cache file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The cache contents could not be encoded or decoded
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Error classification for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transient error - retry with exponential backoff
    ///
    /// Examples: throttling, connection reset, HTTP 503
    Transient,

    /// Permanent error - never retry
    ///
    /// Examples: access denied, missing bucket, bad configuration
    Permanent,
}

/// Classifies an error to determine retry behavior.
pub fn classify_error(error: &PwError) -> ErrorCategory {
    match error {
        PwError::Listing(e) => classify_listing_error(e),
        PwError::Discovery(_) => ErrorCategory::Transient,
        PwError::Cache(_) => ErrorCategory::Permanent,
        PwError::Output(_) => ErrorCategory::Permanent,
        PwError::Config(_) => ErrorCategory::Permanent,
        PwError::Other(e) => classify_listing_error(&ListingError::from_message(e.to_string())),
    }
}

fn classify_listing_error(error: &ListingError) -> ErrorCategory {
    match error {
        ListingError::AccessDenied(_) => ErrorCategory::Permanent,
        ListingError::NoSuchBucket(_) => ErrorCategory::Permanent,
        ListingError::Throttled(_) => ErrorCategory::Transient,
        ListingError::Transport(_) => ErrorCategory::Transient,
        ListingError::InvalidResponse(_) => ErrorCategory::Permanent,
    }
}

/// Result type alias using PwError.
pub type Result<T> = std::result::Result<T, PwError>;
