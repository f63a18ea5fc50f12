//! # Syncgate Store
//!
//! Storage capability port for the Syncgate gateway.
//!
//! This crate provides:
//! - **ObjectStore trait**: The narrow surface the gateway uses against an
//!   S3-compatible backend (head, list, put, delete, presign)
//! - **S3 backend**: `aws-sdk-s3` client for real deployments
//! - **Memory backend**: Ordered in-memory store for development and tests
//! - **Timeouts**: A wrapper that bounds every delegated call
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Object Operations / Feed         │
//! ├─────────────────────────────────────────┤
//! │      TimeoutObjectStore (deadline)      │
//! ├─────────────────────────────────────────┤
//! │           ObjectStore Trait             │
//! ├────────────────────┬────────────────────┤
//! │   S3ObjectStore    │ MemoryObjectStore  │
//! └────────────────────┴────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use syncgate_store::{MemoryObjectStore, ObjectStore};
//!
//! let store = MemoryObjectStore::new("http://localhost:9000", "sync");
//! store.put("users/u1/profile.json", bytes, Some("application/json")).await?;
//! let url = store.presign_get("users/u1/profile.json", Duration::from_secs(60)).await?;
//! ```

pub mod error;
pub mod flexible;
pub mod memory;
pub mod s3;
pub mod timeout;

pub use error::{Result, StoreError};
pub use flexible::FlexibleObjectStore;
pub use memory::MemoryObjectStore;
pub use s3::{S3Config, S3ObjectStore};
pub use timeout::TimeoutObjectStore;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum number of keys accepted by a single `delete_many` call
pub const MAX_DELETE_BATCH: usize = 1000;

/// Maximum number of keys a backend returns per list page
pub const MAX_LIST_PAGE: usize = 1000;

/// Metadata for a stored object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    /// Absolute object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub last_modified: DateTime<Utc>,
}

/// One page of a list operation
#[derive(Clone, Debug, Default)]
pub struct ObjectListing {
    /// Objects on this page, in key order
    pub objects: Vec<ObjectInfo>,
    /// Whether more pages follow
    pub is_truncated: bool,
    /// Opaque cursor for the next page
    pub next_continuation_token: Option<String>,
}

/// Capability interface against the backing object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Get object metadata, `None` when the key does not exist
    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>>;

    /// List one page of objects under a prefix
    async fn list(
        &self,
        prefix: &str,
        max_keys: usize,
        continuation_token: Option<&str>,
    ) -> Result<ObjectListing>;

    /// Store a small object
    async fn put(&self, key: &str, body: Bytes, content_type: Option<&str>) -> Result<()>;

    /// Delete an object (absent keys are not an error)
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete up to [`MAX_DELETE_BATCH`] objects, returning how many were removed
    async fn delete_many(&self, keys: &[String]) -> Result<usize>;

    /// Create a presigned upload URL
    async fn presign_put(
        &self,
        key: &str,
        content_type: Option<&str>,
        expires_in: Duration,
    ) -> Result<String>;

    /// Create a presigned download URL
    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String>;

    /// Check connectivity to the backend
    async fn health_check(&self) -> Result<()>;
}
