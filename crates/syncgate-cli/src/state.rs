//! Application state

use crate::auth::CredentialResolver;
use crate::config::GatewayConfig;
use std::sync::Arc;
use syncgate_core::{ChangeFeed, ObjectService};
use syncgate_store::{FlexibleObjectStore, MemoryObjectStore, TimeoutObjectStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Store stack used by the gateway
pub type GatewayStore = TimeoutObjectStore<FlexibleObjectStore>;

/// Application state shared across handlers
pub struct AppState {
    /// Gateway configuration
    pub config: GatewayConfig,
    /// Object store with per-call deadline
    pub store: Arc<GatewayStore>,
    /// Object operations
    pub objects: ObjectService<GatewayStore>,
    /// Change feed subscriptions
    pub feed: ChangeFeed<GatewayStore>,
    /// Bearer credential resolution
    pub resolver: CredentialResolver,
    /// Cancelled on shutdown to stop feed workers
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create a new application state
    pub async fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let store = if config.use_memory_store {
            info!("Using in-memory object store (data will not persist)");
            FlexibleObjectStore::memory(MemoryObjectStore::default())
        } else {
            FlexibleObjectStore::s3(config.s3.clone()).await?
        };

        Self::with_store(config, store)
    }

    /// Create state around an existing store
    pub fn with_store(config: GatewayConfig, store: FlexibleObjectStore) -> anyhow::Result<Self> {
        config.validate()?;

        if store.is_persistent() {
            info!("Storage mode: S3 (persistent)");
        } else {
            warn!("Storage mode: in-memory (NOT persistent - for development only)");
        }

        let resolver = CredentialResolver::from_config(&config)?;
        if resolver.is_configured() {
            info!(strategies = ?resolver.strategy_names(), "Authentication configured");
        } else {
            warn!("No credential mechanism configured; every request will be rejected");
        }

        let store = Arc::new(TimeoutObjectStore::new(store, config.storage_timeout()));
        let shutdown = CancellationToken::new();
        let objects = ObjectService::new(Arc::clone(&store), config.service_config());
        let feed = ChangeFeed::new(Arc::clone(&store), config.feed_config(), shutdown.clone());

        Ok(Self {
            config,
            store,
            objects,
            feed,
            resolver,
            shutdown,
        })
    }
}
