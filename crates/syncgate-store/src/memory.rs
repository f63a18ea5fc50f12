//! In-memory object store for development and testing

use crate::{ObjectInfo, ObjectListing, ObjectStore, Result, StoreError, MAX_DELETE_BATCH, MAX_LIST_PAGE};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::time::Duration;

/// A stored object
#[derive(Clone, Debug)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
}

/// An in-memory, key-ordered object store
///
/// Presigned URLs point at `{base_url}/{bucket}/{key}` and are not
/// backed by a real HTTP endpoint; uploads made through them must be
/// simulated with [`ObjectStore::put`].
#[derive(Clone)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
    base_url: String,
    bucket: String,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("http://localhost:9000", "syncgate")
    }
}

impl MemoryObjectStore {
    /// Create a new empty memory store
    pub fn new(base_url: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            objects: Arc::new(RwLock::new(BTreeMap::new())),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
        }
    }

    /// Get the number of objects stored
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Read an object's content
    pub fn contents(&self, key: &str) -> Option<Bytes> {
        self.objects.read().get(key).map(|o| o.data.clone())
    }

    /// Read an object's content type
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.read().get(key).and_then(|o| o.content_type.clone())
    }

    /// List all keys
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    fn presigned_url(&self, method: &str, key: &str, expires_in: Duration) -> String {
        let path = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/{}/{}?X-Amz-Expires={}&X-Syncgate-Method={}",
            self.base_url,
            self.bucket,
            path,
            expires_in.as_secs(),
            method
        )
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>> {
        Ok(self.objects.read().get(key).map(|o| ObjectInfo {
            key: key.to_string(),
            size: o.data.len() as u64,
            last_modified: o.last_modified,
        }))
    }

    async fn list(
        &self,
        prefix: &str,
        max_keys: usize,
        continuation_token: Option<&str>,
    ) -> Result<ObjectListing> {
        let max_keys = max_keys.clamp(1, MAX_LIST_PAGE);
        let start = match continuation_token {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Included(prefix.to_string()),
        };

        let objects = self.objects.read();
        let mut matching = objects
            .range::<String, _>((start, Bound::Unbounded))
            .skip_while(|(k, _)| k.as_str() < prefix)
            .take_while(|(k, _)| k.starts_with(prefix));

        let page: Vec<ObjectInfo> = matching
            .by_ref()
            .take(max_keys)
            .map(|(k, o)| ObjectInfo {
                key: k.clone(),
                size: o.data.len() as u64,
                last_modified: o.last_modified,
            })
            .collect();

        let is_truncated = matching.next().is_some();
        let next_continuation_token = if is_truncated {
            page.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(ObjectListing {
            objects: page,
            is_truncated,
            next_continuation_token,
        })
    }

    async fn put(&self, key: &str, body: Bytes, content_type: Option<&str>) -> Result<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidRequest("empty key".to_string()));
        }
        self.objects.write().insert(
            key.to_string(),
            StoredObject {
                data: body,
                content_type: content_type.map(str::to_string),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.write().remove(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize> {
        if keys.len() > MAX_DELETE_BATCH {
            return Err(StoreError::InvalidRequest(format!(
                "at most {} keys per delete",
                MAX_DELETE_BATCH
            )));
        }
        let mut objects = self.objects.write();
        Ok(keys.iter().filter(|k| objects.remove(k.as_str()).is_some()).count())
    }

    async fn presign_put(
        &self,
        key: &str,
        _content_type: Option<&str>,
        expires_in: Duration,
    ) -> Result<String> {
        Ok(self.presigned_url("PUT", key, expires_in))
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String> {
        Ok(self.presigned_url("GET", key, expires_in))
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
