//! Deadline-enforcing wrapper around any object store

use crate::{ObjectInfo, ObjectListing, ObjectStore, Result, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use std::future::Future;
use std::time::Duration;

/// Object store wrapper that bounds every call with a timeout
pub struct TimeoutObjectStore<S: ObjectStore> {
    inner: S,
    timeout: Duration,
}

impl<S: ObjectStore> TimeoutObjectStore<S> {
    /// Wrap a store with the given per-call timeout
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Access the wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get the per-call timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(&self, op: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, timeout_ms = %self.timeout.as_millis(), "Storage call timed out");
                Err(StoreError::Timeout {
                    millis: self.timeout.as_millis() as u64,
                })
            }
        }
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for TimeoutObjectStore<S> {
    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>> {
        self.bounded("head", self.inner.head(key)).await
    }

    async fn list(
        &self,
        prefix: &str,
        max_keys: usize,
        continuation_token: Option<&str>,
    ) -> Result<ObjectListing> {
        self.bounded("list", self.inner.list(prefix, max_keys, continuation_token))
            .await
    }

    async fn put(&self, key: &str, body: Bytes, content_type: Option<&str>) -> Result<()> {
        self.bounded("put", self.inner.put(key, body, content_type)).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.bounded("delete", self.inner.delete(key)).await
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize> {
        self.bounded("delete_many", self.inner.delete_many(keys)).await
    }

    async fn presign_put(
        &self,
        key: &str,
        content_type: Option<&str>,
        expires_in: Duration,
    ) -> Result<String> {
        self.bounded(
            "presign_put",
            self.inner.presign_put(key, content_type, expires_in),
        )
        .await
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String> {
        self.bounded("presign_get", self.inner.presign_get(key, expires_in))
            .await
    }

    async fn health_check(&self) -> Result<()> {
        self.bounded("health_check", self.inner.health_check()).await
    }
}
