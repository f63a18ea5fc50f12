//! Runtime-selected object store backend

use crate::{MemoryObjectStore, ObjectInfo, ObjectListing, ObjectStore, Result, S3Config, S3ObjectStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::info;

/// Object store chosen at startup
#[derive(Clone)]
pub enum FlexibleObjectStore {
    /// S3-compatible service
    S3(S3ObjectStore),
    /// In-memory storage (development)
    Memory(MemoryObjectStore),
}

impl FlexibleObjectStore {
    /// Connect to S3 with the given configuration
    pub async fn s3(config: S3Config) -> Result<Self> {
        let store = S3ObjectStore::new(config).await?;
        info!(bucket = %store.bucket(), "Using S3 object store");
        Ok(Self::S3(store))
    }

    /// Use an in-memory store
    pub fn memory(store: MemoryObjectStore) -> Self {
        Self::Memory(store)
    }

    /// Check if data survives a restart
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::S3(_))
    }
}

#[async_trait]
impl ObjectStore for FlexibleObjectStore {
    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>> {
        match self {
            Self::S3(store) => store.head(key).await,
            Self::Memory(store) => store.head(key).await,
        }
    }

    async fn list(
        &self,
        prefix: &str,
        max_keys: usize,
        continuation_token: Option<&str>,
    ) -> Result<ObjectListing> {
        match self {
            Self::S3(store) => store.list(prefix, max_keys, continuation_token).await,
            Self::Memory(store) => store.list(prefix, max_keys, continuation_token).await,
        }
    }

    async fn put(&self, key: &str, body: Bytes, content_type: Option<&str>) -> Result<()> {
        match self {
            Self::S3(store) => store.put(key, body, content_type).await,
            Self::Memory(store) => store.put(key, body, content_type).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            Self::S3(store) => store.delete(key).await,
            Self::Memory(store) => store.delete(key).await,
        }
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize> {
        match self {
            Self::S3(store) => store.delete_many(keys).await,
            Self::Memory(store) => store.delete_many(keys).await,
        }
    }

    async fn presign_put(
        &self,
        key: &str,
        content_type: Option<&str>,
        expires_in: Duration,
    ) -> Result<String> {
        match self {
            Self::S3(store) => store.presign_put(key, content_type, expires_in).await,
            Self::Memory(store) => store.presign_put(key, content_type, expires_in).await,
        }
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String> {
        match self {
            Self::S3(store) => store.presign_get(key, expires_in).await,
            Self::Memory(store) => store.presign_get(key, expires_in).await,
        }
    }

    async fn health_check(&self) -> Result<()> {
        match self {
            Self::S3(store) => store.health_check().await,
            Self::Memory(store) => store.health_check().await,
        }
    }
}
