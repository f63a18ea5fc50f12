//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use syncgate_core::{FeedConfig, PresignPolicy, ServiceConfig, MAX_PRESIGN_EXPIRY};
use syncgate_store::S3Config;

/// Gateway server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Shared secret for self-hosted access
    #[serde(skip_serializing)]
    pub shared_secret: Option<String>,
    /// PEM-encoded public key for signed claims
    pub jwt_public_key: Option<String>,
    /// File holding the PEM public key
    pub jwt_public_key_file: Option<PathBuf>,
    /// Signing algorithm expected on claims
    pub jwt_algorithm: String,
    /// Required `iss` claim
    pub jwt_issuer: Option<String>,
    /// Required `aud` claim
    pub jwt_audience: Option<String>,
    /// Use in-memory storage (for testing/development)
    pub use_memory_store: bool,
    /// S3 backend settings
    pub s3: S3Config,
    /// Presigned URL lifetime when none is requested (seconds)
    pub presign_default_secs: u64,
    /// Shortest presigned URL lifetime (seconds)
    pub presign_min_secs: u64,
    /// Longest presigned URL lifetime (seconds)
    pub presign_max_secs: u64,
    /// Largest page a list call may return
    pub max_list_keys: usize,
    /// Largest batch presign request
    pub max_batch_items: usize,
    /// Deadline for every storage call (milliseconds)
    pub storage_timeout_ms: u64,
    /// Change feed polling interval (milliseconds)
    pub poll_interval_ms: u64,
    /// Fastest polling a subscriber may ask for (milliseconds)
    pub min_poll_interval_ms: u64,
    /// Slowest polling a subscriber may ask for (milliseconds)
    pub max_poll_interval_ms: u64,
    /// Buffered events per subscriber
    pub feed_channel_capacity: usize,
    /// Rate limit (requests per second per tenant)
    pub rate_limit_rps: u32,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Enable CORS
    pub cors_enabled: bool,
    /// CORS allowed origins
    pub cors_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shared_secret: None,
            jwt_public_key: None,
            jwt_public_key_file: None,
            jwt_algorithm: "RS256".to_string(),
            jwt_issuer: None,
            jwt_audience: None,
            use_memory_store: false,
            s3: S3Config::default(),
            presign_default_secs: 3600,
            presign_min_secs: 60,
            presign_max_secs: 24 * 60 * 60,
            max_list_keys: 1000,
            max_batch_items: 100,
            storage_timeout_ms: 10_000,
            poll_interval_ms: 2000,
            min_poll_interval_ms: 500,
            max_poll_interval_ms: 60_000,
            feed_channel_capacity: 64,
            rate_limit_rps: 100,
            max_body_size: 1024 * 1024, // 1 MiB
            cors_enabled: true,
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl GatewayConfig {
    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Object service limits
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            presign: PresignPolicy {
                default: Duration::from_secs(self.presign_default_secs),
                min: Duration::from_secs(self.presign_min_secs),
                max: Duration::from_secs(self.presign_max_secs),
            },
            max_list_keys: self.max_list_keys,
            max_batch_items: self.max_batch_items,
        }
    }

    /// Change feed tuning
    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            default_interval: Duration::from_millis(self.poll_interval_ms),
            min_interval: Duration::from_millis(self.min_poll_interval_ms),
            max_interval: Duration::from_millis(self.max_poll_interval_ms),
            channel_capacity: self.feed_channel_capacity,
            ..FeedConfig::default()
        }
    }

    /// Per-call storage deadline
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }

    /// Check bounds that would otherwise fail at request time
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.presign_min_secs > self.presign_max_secs {
            anyhow::bail!("presign min expiry exceeds max expiry");
        }
        if self.presign_max_secs > MAX_PRESIGN_EXPIRY.as_secs() {
            anyhow::bail!(
                "presign max expiry exceeds {} seconds",
                MAX_PRESIGN_EXPIRY.as_secs()
            );
        }
        if self.presign_default_secs > self.presign_max_secs {
            anyhow::bail!("presign default expiry exceeds max expiry");
        }
        if self.min_poll_interval_ms == 0 || self.min_poll_interval_ms > self.max_poll_interval_ms {
            anyhow::bail!("poll interval bounds are invalid");
        }
        if self.max_list_keys == 0 || self.max_batch_items == 0 {
            anyhow::bail!("list and batch limits must be positive");
        }
        if self.feed_channel_capacity == 0 || self.max_body_size == 0 {
            anyhow::bail!("feed channel capacity and body size limit must be positive");
        }
        if self.rate_limit_rps == 0 {
            anyhow::bail!("rate limit must be positive");
        }
        if self.storage_timeout_ms == 0 {
            anyhow::bail!("storage timeout must be positive");
        }
        if let Some(endpoint) = &self.s3.endpoint {
            url::Url::parse(endpoint)
                .map_err(|e| anyhow::anyhow!("invalid S3 endpoint {}: {}", endpoint, e))?;
        }
        Ok(())
    }
}
