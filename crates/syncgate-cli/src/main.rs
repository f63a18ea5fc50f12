//! Syncgate Gateway - tenant-isolated access to S3-compatible storage

use clap::Parser;
use std::path::PathBuf;
use syncgate_cli::{run_server, GatewayConfig};
use syncgate_store::S3Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "syncgate-gateway")]
#[command(about = "Multi-tenant gateway in front of S3-compatible storage")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "SYNCGATE_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "SYNCGATE_PORT")]
    port: u16,

    /// Shared secret granting self-hosted access
    #[arg(long, env = "SYNCGATE_SHARED_SECRET", hide_env_values = true)]
    shared_secret: Option<String>,

    /// PEM public key for signed claims
    #[arg(long, env = "SYNCGATE_JWT_PUBLIC_KEY", hide_env_values = true)]
    jwt_public_key: Option<String>,

    /// File containing the PEM public key for signed claims
    #[arg(long, env = "SYNCGATE_JWT_PUBLIC_KEY_FILE")]
    jwt_public_key_file: Option<PathBuf>,

    /// Signing algorithm for claims
    #[arg(long, default_value = "RS256", env = "SYNCGATE_JWT_ALGORITHM")]
    jwt_algorithm: String,

    /// Required token issuer
    #[arg(long, env = "SYNCGATE_JWT_ISSUER")]
    jwt_issuer: Option<String>,

    /// Required token audience
    #[arg(long, env = "SYNCGATE_JWT_AUDIENCE")]
    jwt_audience: Option<String>,

    /// Use in-memory storage (for testing, data will not persist)
    #[arg(long, env = "SYNCGATE_MEMORY_STORE")]
    memory_store: bool,

    /// S3 bucket
    #[arg(long, default_value = "", env = "SYNCGATE_S3_BUCKET")]
    s3_bucket: String,

    /// S3 region
    #[arg(long, env = "SYNCGATE_S3_REGION")]
    s3_region: Option<String>,

    /// S3 endpoint for non-AWS services
    #[arg(long, env = "SYNCGATE_S3_ENDPOINT")]
    s3_endpoint: Option<String>,

    /// S3 access key id
    #[arg(long, env = "SYNCGATE_S3_ACCESS_KEY_ID")]
    s3_access_key_id: Option<String>,

    /// S3 secret access key
    #[arg(long, env = "SYNCGATE_S3_SECRET_ACCESS_KEY", hide_env_values = true)]
    s3_secret_access_key: Option<String>,

    /// Use path-style S3 addressing
    #[arg(long, env = "SYNCGATE_S3_FORCE_PATH_STYLE")]
    s3_force_path_style: bool,

    /// Default presigned URL lifetime in seconds
    #[arg(long, default_value = "3600", env = "SYNCGATE_PRESIGN_DEFAULT_SECS")]
    presign_default_secs: u64,

    /// Minimum presigned URL lifetime in seconds
    #[arg(long, default_value = "60", env = "SYNCGATE_PRESIGN_MIN_SECS")]
    presign_min_secs: u64,

    /// Maximum presigned URL lifetime in seconds
    #[arg(long, default_value = "86400", env = "SYNCGATE_PRESIGN_MAX_SECS")]
    presign_max_secs: u64,

    /// Largest page a list call may return
    #[arg(long, default_value = "1000", env = "SYNCGATE_MAX_LIST_KEYS")]
    max_list_keys: usize,

    /// Largest batch presign request
    #[arg(long, default_value = "100", env = "SYNCGATE_MAX_BATCH_ITEMS")]
    max_batch_items: usize,

    /// Deadline for each storage call in milliseconds
    #[arg(long, default_value = "10000", env = "SYNCGATE_STORAGE_TIMEOUT_MS")]
    storage_timeout_ms: u64,

    /// Default change feed poll interval in milliseconds
    #[arg(long, default_value = "2000", env = "SYNCGATE_POLL_INTERVAL_MS")]
    poll_interval_ms: u64,

    /// Fastest change feed poll interval a subscriber may request, in milliseconds
    #[arg(long, default_value = "500", env = "SYNCGATE_MIN_POLL_INTERVAL_MS")]
    min_poll_interval_ms: u64,

    /// Slowest change feed poll interval a subscriber may request, in milliseconds
    #[arg(long, default_value = "60000", env = "SYNCGATE_MAX_POLL_INTERVAL_MS")]
    max_poll_interval_ms: u64,

    /// Events buffered per change feed subscriber
    #[arg(long, default_value = "64", env = "SYNCGATE_FEED_CHANNEL_CAPACITY")]
    feed_channel_capacity: usize,

    /// Requests per second allowed per tenant
    #[arg(long, default_value = "100", env = "SYNCGATE_RATE_LIMIT_RPS")]
    rate_limit_rps: u32,

    /// Maximum request body size in bytes
    #[arg(long, default_value = "1048576", env = "SYNCGATE_MAX_BODY_SIZE")]
    max_body_size: usize,

    /// Comma-separated CORS origins
    #[arg(long, default_value = "*", env = "SYNCGATE_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,

    /// Disable CORS headers
    #[arg(long, env = "SYNCGATE_NO_CORS")]
    no_cors: bool,

    /// Enable debug logging
    #[arg(short, long, env = "SYNCGATE_DEBUG")]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long, env = "SYNCGATE_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Parse arguments
    let args = Args::parse();

    // Setup logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "syncgate_cli={0},syncgate_core={0},syncgate_store={0},tower_http={0}",
            log_level
        )
        .into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Syncgate gateway on {}:{}", args.host, args.port);

    if args.memory_store {
        tracing::warn!("Using in-memory storage - data will NOT persist!");
    } else {
        tracing::info!(bucket = %args.s3_bucket, endpoint = ?args.s3_endpoint, "S3 backend");
    }

    // Run the server
    run_server(args.into_config()).await
}

impl Args {
    /// Gateway configuration from parsed flags
    fn into_config(self) -> GatewayConfig {
        GatewayConfig {
            host: self.host,
            port: self.port,
            shared_secret: self.shared_secret,
            jwt_public_key: self.jwt_public_key,
            jwt_public_key_file: self.jwt_public_key_file,
            jwt_algorithm: self.jwt_algorithm,
            jwt_issuer: self.jwt_issuer,
            jwt_audience: self.jwt_audience,
            use_memory_store: self.memory_store,
            s3: S3Config {
                bucket: self.s3_bucket,
                region: self.s3_region,
                endpoint: self.s3_endpoint,
                access_key_id: self.s3_access_key_id,
                secret_access_key: self.s3_secret_access_key,
                force_path_style: self.s3_force_path_style,
            },
            presign_default_secs: self.presign_default_secs,
            presign_min_secs: self.presign_min_secs,
            presign_max_secs: self.presign_max_secs,
            max_list_keys: self.max_list_keys,
            max_batch_items: self.max_batch_items,
            storage_timeout_ms: self.storage_timeout_ms,
            poll_interval_ms: self.poll_interval_ms,
            min_poll_interval_ms: self.min_poll_interval_ms,
            max_poll_interval_ms: self.max_poll_interval_ms,
            feed_channel_capacity: self.feed_channel_capacity,
            rate_limit_rps: self.rate_limit_rps,
            max_body_size: self.max_body_size,
            cors_enabled: !self.no_cors,
            cors_origins: self.cors_origins,
        }
    }
}
