//! Object operations scoped to a caller's prefix
//!
//! Every method resolves its keys through [`crate::prefix`] before the
//! store is touched. Batch presigning is all-or-nothing: every key is
//! validated up front and a single failure fails the request before any
//! URL is issued.

use crate::context::{KeyScope, UserContext};
use crate::error::{CoreError, Result};
use crate::prefix::{relativize, resolve_key, resolve_prefix};
use crate::tombstone::{default_tombstone_key, is_tombstone_key, Tombstone};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use syncgate_store::{ObjectStore, MAX_LIST_PAGE};
use tracing::{debug, info, warn};

/// Longest lifetime S3 accepts for a presigned URL (7 days)
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Bounds applied to presigned URL lifetimes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresignPolicy {
    /// Lifetime used when the caller does not ask for one
    pub default: Duration,
    /// Shortest lifetime issued
    pub min: Duration,
    /// Longest lifetime issued
    pub max: Duration,
}

impl Default for PresignPolicy {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(3600),
            min: Duration::from_secs(60),
            max: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl PresignPolicy {
    /// Effective lifetime for a requested `expiresIn` (seconds)
    ///
    /// Never exceeds [`MAX_PRESIGN_EXPIRY`], whatever the configured bounds.
    pub fn effective(&self, requested: Option<i64>) -> Result<Duration> {
        let max = self.max.min(MAX_PRESIGN_EXPIRY);
        let min = self.min.min(max);
        match requested {
            None => Ok(self.default.clamp(min, max)),
            Some(secs) if secs < 0 => Err(CoreError::InvalidArgument(
                "expiresIn must not be negative".to_string(),
            )),
            Some(secs) => Ok(Duration::from_secs(secs as u64).clamp(min, max)),
        }
    }
}

/// Object service limits
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Presigned URL lifetime bounds
    pub presign: PresignPolicy,
    /// Upper bound for `maxKeys` on list
    pub max_list_keys: usize,
    /// Upper bound for batch presign items
    pub max_batch_items: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            presign: PresignPolicy::default(),
            max_list_keys: MAX_LIST_PAGE,
            max_batch_items: 100,
        }
    }
}

/// Result of a stat call
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatResult {
    /// Whether the object exists
    pub exists: bool,
    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    /// Size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// A presigned URL and when it stops working
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrl {
    /// Presigned URL
    pub url: String,
    /// Expiry computed from the issue time
    pub expires_at: DateTime<Utc>,
}

/// One presigned URL in a batch response
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedItem {
    /// Key as the caller sent it
    pub key: String,
    /// Presigned URL
    pub url: String,
    /// Expiry computed from the issue time
    pub expires_at: DateTime<Utc>,
}

/// One requested upload in a batch
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadItem {
    /// Relative key
    pub key: String,
    /// Content type the upload will carry
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Result of a single delete
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    /// Whether an object was removed
    pub deleted: bool,
    /// Whether the tombstone write succeeded
    pub tombstone_created: bool,
}

/// Result of a prefix delete
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePrefixResult {
    /// Number of objects removed
    pub deleted_count: usize,
    /// Whether the tombstone write succeeded
    pub tombstone_created: bool,
}

/// An object in a list page
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedObject {
    /// Key relative to the caller's root
    pub key: String,
    /// Last modified timestamp
    pub last_modified: DateTime<Utc>,
    /// Size in bytes
    pub size: u64,
}

/// One page of objects
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    /// Objects on this page
    pub objects: Vec<ListedObject>,
    /// Whether more pages follow
    pub is_truncated: bool,
    /// Cursor for the next page, present iff truncated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_continuation_token: Option<String>,
}

/// Stateless object operations against a store
pub struct ObjectService<S: ObjectStore> {
    store: Arc<S>,
    config: ServiceConfig,
}

impl<S: ObjectStore> ObjectService<S> {
    /// Create a new service
    pub fn new(store: Arc<S>, config: ServiceConfig) -> Self {
        Self { store, config }
    }

    /// Get the service configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Report whether an object exists and its metadata
    pub async fn stat(&self, ctx: &UserContext, key: &str, scope: KeyScope) -> Result<StatResult> {
        let absolute = resolve_key(key, ctx, scope)?;
        debug!(key = %absolute, "stat");

        Ok(match self.store.head(&absolute).await? {
            Some(info) => StatResult {
                exists: true,
                last_modified: Some(info.last_modified),
                size: Some(info.size),
            },
            None => StatResult {
                exists: false,
                last_modified: None,
                size: None,
            },
        })
    }

    /// Issue a presigned upload URL
    pub async fn presign_upload(
        &self,
        ctx: &UserContext,
        key: &str,
        content_type: Option<&str>,
        expires_in: Option<i64>,
        scope: KeyScope,
    ) -> Result<PresignedUrl> {
        let absolute = resolve_key(key, ctx, scope)?;
        validate_content_type(content_type)?;
        let ttl = self.config.presign.effective(expires_in)?;

        let issued_at = Utc::now();
        let url = self.store.presign_put(&absolute, content_type, ttl).await?;
        debug!(key = %absolute, ttl_secs = ttl.as_secs(), "Issued upload URL");

        Ok(PresignedUrl {
            url,
            expires_at: expiry(issued_at, ttl),
        })
    }

    /// Issue a presigned download URL
    pub async fn presign_download(
        &self,
        ctx: &UserContext,
        key: &str,
        expires_in: Option<i64>,
        scope: KeyScope,
    ) -> Result<PresignedUrl> {
        let absolute = resolve_key(key, ctx, scope)?;
        let ttl = self.config.presign.effective(expires_in)?;

        let issued_at = Utc::now();
        let url = self.store.presign_get(&absolute, ttl).await?;
        debug!(key = %absolute, ttl_secs = ttl.as_secs(), "Issued download URL");

        Ok(PresignedUrl {
            url,
            expires_at: expiry(issued_at, ttl),
        })
    }

    /// Issue presigned upload URLs for several keys, preserving input order
    pub async fn presign_upload_batch(
        &self,
        ctx: &UserContext,
        items: &[UploadItem],
        expires_in: Option<i64>,
        scope: KeyScope,
    ) -> Result<Vec<PresignedItem>> {
        self.check_batch_len(items.len())?;
        let ttl = self.config.presign.effective(expires_in)?;

        let resolved = items
            .iter()
            .map(|item| {
                validate_content_type(item.content_type.as_deref())?;
                Ok(resolve_key(&item.key, ctx, scope)?)
            })
            .collect::<Result<Vec<_>>>()?;

        let issued_at = Utc::now();
        let urls = try_join_all(
            resolved
                .iter()
                .zip(items)
                .map(|(absolute, item)| self.store.presign_put(absolute, item.content_type.as_deref(), ttl)),
        )
        .await?;
        debug!(count = urls.len(), "Issued batch upload URLs");

        let expires_at = expiry(issued_at, ttl);
        Ok(items
            .iter()
            .zip(urls)
            .map(|(item, url)| PresignedItem {
                key: item.key.clone(),
                url,
                expires_at,
            })
            .collect())
    }

    /// Issue presigned download URLs for several keys, preserving input order
    pub async fn presign_download_batch(
        &self,
        ctx: &UserContext,
        keys: &[String],
        expires_in: Option<i64>,
        scope: KeyScope,
    ) -> Result<Vec<PresignedItem>> {
        self.check_batch_len(keys.len())?;
        let ttl = self.config.presign.effective(expires_in)?;

        let resolved = keys
            .iter()
            .map(|key| resolve_key(key, ctx, scope))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let issued_at = Utc::now();
        let urls = try_join_all(resolved.iter().map(|absolute| self.store.presign_get(absolute, ttl))).await?;
        debug!(count = urls.len(), "Issued batch download URLs");

        let expires_at = expiry(issued_at, ttl);
        Ok(keys
            .iter()
            .zip(urls)
            .map(|(key, url)| PresignedItem {
                key: key.clone(),
                url,
                expires_at,
            })
            .collect())
    }

    /// Delete an object and record a tombstone
    ///
    /// Deleting an absent key reports `deleted: false` but still writes the
    /// tombstone, so replaying a delete is harmless.
    pub async fn delete(
        &self,
        ctx: &UserContext,
        key: &str,
        tombstone_key: Option<&str>,
        deleted_at: Option<DateTime<Utc>>,
        scope: KeyScope,
    ) -> Result<DeleteResult> {
        let absolute = resolve_key(key, ctx, scope)?;
        let root = root_of(ctx, scope)?;
        let relative = relativize(&absolute, root).to_string();
        let tombstone_target = tombstone_location(ctx, &relative, tombstone_key, scope)?;

        let deleted = match self.store.head(&absolute).await? {
            Some(_) => {
                self.store.delete(&absolute).await?;
                true
            }
            None => false,
        };
        info!(key = %absolute, deleted, "Deleted object");

        let tombstone_created = match tombstone_target {
            Some(target) => {
                self.write_tombstone(&target, &relative, deleted_at.unwrap_or_else(Utc::now))
                    .await
            }
            None => false,
        };

        Ok(DeleteResult {
            deleted,
            tombstone_created,
        })
    }

    /// Delete every object under a prefix and record one tombstone
    pub async fn delete_prefix(
        &self,
        ctx: &UserContext,
        prefix: &str,
        tombstone_key: Option<&str>,
        deleted_at: Option<DateTime<Utc>>,
        scope: KeyScope,
    ) -> Result<DeletePrefixResult> {
        let absolute = resolve_prefix(prefix, ctx, scope)?;
        let root = root_of(ctx, scope)?;
        if absolute.len() == root.len() {
            return Err(CoreError::InvalidArgument(
                "prefix must not be empty".to_string(),
            ));
        }
        let relative = relativize(&absolute, root).to_string();
        let tombstone_target = tombstone_location(ctx, &relative, tombstone_key, scope)?;

        let mut deleted_count = 0;
        let mut continuation_token: Option<String> = None;
        loop {
            let page = self
                .store
                .list(&absolute, MAX_LIST_PAGE, continuation_token.as_deref())
                .await?;
            let keys: Vec<String> = page.objects.into_iter().map(|o| o.key).collect();
            if !keys.is_empty() {
                deleted_count += self.store.delete_many(&keys).await?;
            }

            match page.next_continuation_token {
                Some(token) if page.is_truncated => continuation_token = Some(token),
                _ => break,
            }
        }
        info!(prefix = %absolute, deleted_count, "Deleted prefix");

        let tombstone_created = match tombstone_target {
            Some(target) => {
                self.write_tombstone(&target, &relative, deleted_at.unwrap_or_else(Utc::now))
                    .await
            }
            None => false,
        };

        Ok(DeletePrefixResult {
            deleted_count,
            tombstone_created,
        })
    }

    /// List one page of objects under a prefix
    pub async fn list(
        &self,
        ctx: &UserContext,
        prefix: &str,
        max_keys: Option<usize>,
        continuation_token: Option<&str>,
        scope: KeyScope,
    ) -> Result<ListPage> {
        let absolute = resolve_prefix(prefix, ctx, scope)?;
        let root = root_of(ctx, scope)?;
        let max_keys = max_keys
            .unwrap_or(self.config.max_list_keys)
            .clamp(1, self.config.max_list_keys.max(1));
        let continuation_token = continuation_token.filter(|t| !t.is_empty());

        let page = self.store.list(&absolute, max_keys, continuation_token).await?;
        let next_continuation_token = page.next_continuation_token.filter(|_| page.is_truncated);

        Ok(ListPage {
            objects: page
                .objects
                .into_iter()
                .map(|o| ListedObject {
                    key: relativize(&o.key, root).to_string(),
                    last_modified: o.last_modified,
                    size: o.size,
                })
                .collect(),
            is_truncated: next_continuation_token.is_some(),
            next_continuation_token,
        })
    }

    /// Best-effort tombstone write
    async fn write_tombstone(&self, target: &str, original_key: &str, deleted_at: DateTime<Utc>) -> bool {
        let body = match serde_json::to_vec(&Tombstone::new(original_key, deleted_at)) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed to serialize tombstone");
                return false;
            }
        };

        match self
            .store
            .put(target, Bytes::from(body), Some("application/json"))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, tombstone = %target, "Failed to write tombstone");
                false
            }
        }
    }

    fn check_batch_len(&self, len: usize) -> Result<()> {
        if len > self.config.max_batch_items {
            return Err(CoreError::InvalidArgument(format!(
                "at most {} items per batch",
                self.config.max_batch_items
            )));
        }
        Ok(())
    }
}

fn root_of(ctx: &UserContext, scope: KeyScope) -> Result<&str> {
    ctx.root(scope).ok_or(CoreError::Forbidden)
}

/// Absolute tombstone key for a delete, `None` when no tombstone applies
///
/// Deleting something inside the tombstone directory does not create a
/// tombstone of its own unless the caller names one. A caller-supplied key
/// must resolve; a default location that does not resolve (for example one
/// longer than the key limit) only skips the tombstone.
fn tombstone_location(
    ctx: &UserContext,
    relative: &str,
    requested: Option<&str>,
    scope: KeyScope,
) -> Result<Option<String>> {
    match requested {
        Some(key) => Ok(Some(resolve_key(key, ctx, scope)?)),
        None if is_tombstone_key(relative) => Ok(None),
        None => match resolve_key(&default_tombstone_key(relative), ctx, scope) {
            Ok(target) => Ok(Some(target)),
            Err(e) => {
                warn!(error = %e, key = %relative, "No valid tombstone location, skipping tombstone");
                Ok(None)
            }
        },
    }
}

fn validate_content_type(content_type: Option<&str>) -> Result<()> {
    match content_type {
        Some(ct) if ct.trim().is_empty() || ct.chars().any(char::is_control) => Err(
            CoreError::InvalidArgument("contentType is malformed".to_string()),
        ),
        _ => Ok(()),
    }
}

fn expiry(issued_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    issued_at + chrono::Duration::seconds(ttl.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use syncgate_store::{MemoryObjectStore, ObjectInfo, ObjectListing, StoreError};

    fn tenant() -> UserContext {
        UserContext::cloud("users/u1/", Some("teams/t1/".to_string()), 0)
    }

    fn service() -> (Arc<MemoryObjectStore>, ObjectService<MemoryObjectStore>) {
        let store = Arc::new(MemoryObjectStore::default());
        let service = ObjectService::new(Arc::clone(&store), ServiceConfig::default());
        (store, service)
    }

    async fn seed(store: &MemoryObjectStore, keys: &[&str]) {
        for key in keys {
            store.put(key, Bytes::from_static(b"hello"), None).await.unwrap();
        }
    }

    #[test]
    fn test_presign_policy_never_exceeds_seven_days() {
        let policy = PresignPolicy {
            default: Duration::from_secs(u64::MAX / 2),
            min: Duration::from_secs(60),
            max: Duration::from_secs(u64::MAX / 2),
        };
        assert_eq!(policy.effective(None).unwrap(), MAX_PRESIGN_EXPIRY);
        assert_eq!(policy.effective(Some(i64::MAX)).unwrap(), MAX_PRESIGN_EXPIRY);
        assert_eq!(policy.effective(Some(120)).unwrap(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_stat() {
        let (store, service) = service();
        seed(&store, &["users/u1/profiles/a.json"]).await;

        let found = service.stat(&tenant(), "profiles/a.json", KeyScope::Own).await.unwrap();
        assert!(found.exists);
        assert_eq!(found.size, Some(5));

        let missing = service.stat(&tenant(), "profiles/b.json", KeyScope::Own).await.unwrap();
        assert_eq!(
            missing,
            StatResult {
                exists: false,
                last_modified: None,
                size: None
            }
        );
    }

    #[tokio::test]
    async fn test_out_of_scope_is_forbidden() {
        let (store, service) = service();
        seed(&store, &["users/u2/secret.json"]).await;

        let result = service.stat(&tenant(), "../u2/secret.json", KeyScope::Own).await;
        assert!(matches!(result, Err(CoreError::Forbidden)));

        let result = service
            .delete(&tenant(), "../u2/secret.json", None, None, KeyScope::Own)
            .await;
        assert!(matches!(result, Err(CoreError::Forbidden)));
        assert!(store.contents("users/u2/secret.json").is_some());
    }

    #[tokio::test]
    async fn test_empty_key_is_invalid() {
        let (_, service) = service();
        let result = service.presign_download(&tenant(), "", None, KeyScope::Own).await;
        assert!(matches!(result, Err(CoreError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_presign_upload_uses_absolute_key() {
        let (_, service) = service();
        let before = Utc::now();
        let presigned = service
            .presign_upload(&tenant(), "profiles/a.json", Some("application/json"), None, KeyScope::Own)
            .await
            .unwrap();

        assert!(presigned.url.contains("users/u1/profiles/a.json"));
        assert!(presigned.url.contains("X-Amz-Expires=3600"));
        assert!(presigned.expires_at >= before + chrono::Duration::seconds(3600));
        assert!(presigned.expires_at <= Utc::now() + chrono::Duration::seconds(3600));
    }

    #[tokio::test]
    async fn test_presign_expiry_is_clamped() {
        let (_, service) = service();
        let long = service
            .presign_download(&tenant(), "a.txt", Some(10 * 24 * 3600), KeyScope::Own)
            .await
            .unwrap();
        assert!(long.url.contains("X-Amz-Expires=86400"));

        let short = service
            .presign_download(&tenant(), "a.txt", Some(1), KeyScope::Own)
            .await
            .unwrap();
        assert!(short.url.contains("X-Amz-Expires=60"));

        let negative = service
            .presign_download(&tenant(), "a.txt", Some(-5), KeyScope::Own)
            .await;
        assert!(matches!(negative, Err(CoreError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let (_, service) = service();
        let items: Vec<UploadItem> = ["c.json", "a.json", "b.json"]
            .iter()
            .map(|k| UploadItem {
                key: k.to_string(),
                content_type: None,
            })
            .collect();

        let presigned = service
            .presign_upload_batch(&tenant(), &items, None, KeyScope::Own)
            .await
            .unwrap();

        let keys: Vec<_> = presigned.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["c.json", "a.json", "b.json"]);
        for item in &presigned {
            assert!(item.url.contains(&format!("users/u1/{}", item.key)));
        }
    }

    #[tokio::test]
    async fn test_batch_fails_whole_request_on_scope_violation() {
        let (_, service) = service();
        let keys = vec!["ok.json".to_string(), "../u2/steal.json".to_string()];

        let result = service
            .presign_download_batch(&tenant(), &keys, None, KeyScope::Own)
            .await;
        assert!(matches!(result, Err(CoreError::Forbidden)));
    }

    #[tokio::test]
    async fn test_batch_limit() {
        let (_, service) = service();
        let keys: Vec<String> = (0..101).map(|i| format!("k{}", i)).collect();
        let result = service
            .presign_download_batch(&tenant(), &keys, None, KeyScope::Own)
            .await;
        assert!(matches!(result, Err(CoreError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, service) = service();
        seed(&store, &["users/u1/profiles/a.json"]).await;

        let first = service
            .delete(&tenant(), "profiles/a.json", Some("tombstones/a.json"), None, KeyScope::Own)
            .await
            .unwrap();
        assert_eq!(
            first,
            DeleteResult {
                deleted: true,
                tombstone_created: true
            }
        );

        let second = service
            .delete(&tenant(), "profiles/a.json", Some("tombstones/a.json"), None, KeyScope::Own)
            .await
            .unwrap();
        assert_eq!(
            second,
            DeleteResult {
                deleted: false,
                tombstone_created: true
            }
        );
    }

    #[tokio::test]
    async fn test_delete_writes_default_tombstone() {
        let (store, service) = service();
        seed(&store, &["users/u1/profiles/a.json"]).await;
        let deleted_at = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);

        service
            .delete(&tenant(), "profiles/a.json", None, Some(deleted_at), KeyScope::Own)
            .await
            .unwrap();

        let raw = store
            .contents("users/u1/tombstones/profiles/a.json.json")
            .unwrap();
        let tombstone: Tombstone = serde_json::from_slice(&raw).unwrap();
        assert_eq!(tombstone, Tombstone::new("profiles/a.json", deleted_at));
        assert_eq!(
            store.content_type("users/u1/tombstones/profiles/a.json.json").as_deref(),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn test_tombstone_key_out_of_scope_is_rejected_before_delete() {
        let (store, service) = service();
        seed(&store, &["users/u1/a.json"]).await;

        let result = service
            .delete(&tenant(), "a.json", Some("../u2/t.json"), None, KeyScope::Own)
            .await;
        assert!(matches!(result, Err(CoreError::Forbidden)));
        assert!(store.contents("users/u1/a.json").is_some());
    }

    #[tokio::test]
    async fn test_deleting_a_tombstone_creates_none() {
        let (store, service) = service();
        seed(&store, &["users/u1/tombstones/a.json"]).await;

        let result = service
            .delete(&tenant(), "tombstones/a.json", None, None, KeyScope::Own)
            .await
            .unwrap();
        assert!(result.deleted);
        assert!(!result.tombstone_created);
        assert!(store.is_empty());
    }

    /// Memory store that refuses every write
    struct ReadOnlyStore(MemoryObjectStore);

    #[async_trait]
    impl ObjectStore for ReadOnlyStore {
        async fn head(&self, key: &str) -> syncgate_store::Result<Option<ObjectInfo>> {
            self.0.head(key).await
        }
        async fn list(
            &self,
            prefix: &str,
            max_keys: usize,
            token: Option<&str>,
        ) -> syncgate_store::Result<ObjectListing> {
            self.0.list(prefix, max_keys, token).await
        }
        async fn put(&self, _: &str, _: Bytes, _: Option<&str>) -> syncgate_store::Result<()> {
            Err(StoreError::Backend("read-only".to_string()))
        }
        async fn delete(&self, key: &str) -> syncgate_store::Result<()> {
            self.0.delete(key).await
        }
        async fn delete_many(&self, keys: &[String]) -> syncgate_store::Result<usize> {
            self.0.delete_many(keys).await
        }
        async fn presign_put(
            &self,
            key: &str,
            content_type: Option<&str>,
            expires_in: Duration,
        ) -> syncgate_store::Result<String> {
            self.0.presign_put(key, content_type, expires_in).await
        }
        async fn presign_get(&self, key: &str, expires_in: Duration) -> syncgate_store::Result<String> {
            self.0.presign_get(key, expires_in).await
        }
        async fn health_check(&self) -> syncgate_store::Result<()> {
            Ok(())
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_failed_tombstone_does_not_fail_delete() {
        let memory = MemoryObjectStore::default();
        seed(&memory, &["users/u1/a.json"]).await;
        let service = ObjectService::new(Arc::new(ReadOnlyStore(memory.clone())), ServiceConfig::default());

        let result = service
            .delete(&tenant(), "a.json", None, None, KeyScope::Own)
            .await
            .unwrap();
        assert_eq!(
            result,
            DeleteResult {
                deleted: true,
                tombstone_created: false
            }
        );
        assert!(memory.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_delete_with_oversized_tombstone_location() {
        let (store, service) = service();
        let key = "k".repeat(1005);
        let absolute = format!("users/u1/{}", key);
        store.put(&absolute, Bytes::from_static(b"x"), None).await.unwrap();
        assert!(service.stat(&tenant(), &key, KeyScope::Own).await.unwrap().exists);

        let result = service
            .delete(&tenant(), &key, None, None, KeyScope::Own)
            .await
            .unwrap();
        assert_eq!(
            result,
            DeleteResult {
                deleted: true,
                tombstone_created: false
            }
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_prefix_with_oversized_tombstone_location() {
        let (store, service) = service();
        let prefix = format!("{}/", "p".repeat(1005));
        store
            .put(&format!("users/u1/{}x", prefix), Bytes::from_static(b"x"), None)
            .await
            .unwrap();

        let result = service
            .delete_prefix(&tenant(), &prefix, None, None, KeyScope::Own)
            .await
            .unwrap();
        assert_eq!(result.deleted_count, 1);
        assert!(!result.tombstone_created);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_requested_tombstone_out_of_scope() {
        let (store, service) = service();
        seed(&store, &["users/u1/a.json"]).await;

        let result = service
            .delete(&tenant(), "a.json", Some("../u2/t.json"), None, KeyScope::Own)
            .await;
        assert!(matches!(result, Err(CoreError::Forbidden)));
        assert_eq!(store.len(), 1);
    }

    /// Fails every listing that continues past the first page while `failing` is set
    struct FirstPageOnlyStore {
        inner: MemoryObjectStore,
        failing: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl ObjectStore for FirstPageOnlyStore {
        async fn head(&self, key: &str) -> syncgate_store::Result<Option<ObjectInfo>> {
            self.inner.head(key).await
        }
        async fn list(
            &self,
            prefix: &str,
            max_keys: usize,
            token: Option<&str>,
        ) -> syncgate_store::Result<ObjectListing> {
            if token.is_some() && self.failing.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(StoreError::Backend("connection reset".to_string()));
            }
            self.inner.list(prefix, max_keys, token).await
        }
        async fn put(&self, key: &str, body: Bytes, content_type: Option<&str>) -> syncgate_store::Result<()> {
            self.inner.put(key, body, content_type).await
        }
        async fn delete(&self, key: &str) -> syncgate_store::Result<()> {
            self.inner.delete(key).await
        }
        async fn delete_many(&self, keys: &[String]) -> syncgate_store::Result<usize> {
            self.inner.delete_many(keys).await
        }
        async fn presign_put(
            &self,
            key: &str,
            content_type: Option<&str>,
            expires_in: Duration,
        ) -> syncgate_store::Result<String> {
            self.inner.presign_put(key, content_type, expires_in).await
        }
        async fn presign_get(&self, key: &str, expires_in: Duration) -> syncgate_store::Result<String> {
            self.inner.presign_get(key, expires_in).await
        }
        async fn health_check(&self) -> syncgate_store::Result<()> {
            Ok(())
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_delete_prefix_partial_failure_then_retry() {
        let memory = MemoryObjectStore::default();
        for i in 0..1203 {
            memory
                .put(&format!("users/u1/backups/{:05}", i), Bytes::from_static(b"x"), None)
                .await
                .unwrap();
        }
        let store = Arc::new(FirstPageOnlyStore {
            inner: memory.clone(),
            failing: std::sync::atomic::AtomicBool::new(true),
        });
        let service = ObjectService::new(Arc::clone(&store), ServiceConfig::default());

        let result = service
            .delete_prefix(&tenant(), "backups/", None, None, KeyScope::Own)
            .await;
        assert!(matches!(result, Err(CoreError::StorageUnavailable(_))));
        assert_eq!(memory.len(), 203);
        assert!(memory.contents("users/u1/tombstones/backups.json").is_none());

        store.failing.store(false, std::sync::atomic::Ordering::SeqCst);
        let result = service
            .delete_prefix(&tenant(), "backups/", None, None, KeyScope::Own)
            .await
            .unwrap();
        assert_eq!(result.deleted_count, 203);
        assert!(result.tombstone_created);
        assert_eq!(memory.keys(), vec!["users/u1/tombstones/backups.json"]);
    }

    #[tokio::test]
    async fn test_delete_prefix_paginates_and_writes_one_tombstone() {
        let (store, service) = service();
        for i in 0..1203 {
            store
                .put(&format!("users/u1/backups/{:05}", i), Bytes::from_static(b"x"), None)
                .await
                .unwrap();
        }
        seed(&store, &["users/u1/keep.json", "users/u2/backups/other"]).await;

        let result = service
            .delete_prefix(&tenant(), "backups/", None, None, KeyScope::Own)
            .await
            .unwrap();
        assert_eq!(result.deleted_count, 1203);
        assert!(result.tombstone_created);

        let mut keys = store.keys();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "users/u1/keep.json",
                "users/u1/tombstones/backups.json",
                "users/u2/backups/other",
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_prefix_rejects_whole_root() {
        let (store, service) = service();
        seed(&store, &["users/u1/a.json"]).await;

        let result = service
            .delete_prefix(&tenant(), "", None, None, KeyScope::Own)
            .await;
        assert!(matches!(result, Err(CoreError::InvalidArgument(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_list_empty_prefix() {
        let (_, service) = service();
        let page = service
            .list(&tenant(), "p/", None, None, KeyScope::Own)
            .await
            .unwrap();
        assert!(page.objects.is_empty());
        assert!(!page.is_truncated);
        assert!(page.next_continuation_token.is_none());

        let json = serde_json::to_value(&page).unwrap();
        assert!(json.get("nextContinuationToken").is_none());
    }

    #[tokio::test]
    async fn test_list_returns_relative_keys_and_pages() {
        let (store, service) = service();
        seed(&store, &["users/u1/p/1", "users/u1/p/2", "users/u1/p/3"]).await;

        let first = service
            .list(&tenant(), "p/", Some(2), None, KeyScope::Own)
            .await
            .unwrap();
        let keys: Vec<_> = first.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["p/1", "p/2"]);
        assert!(first.is_truncated);

        let second = service
            .list(
                &tenant(),
                "p/",
                Some(2),
                first.next_continuation_token.as_deref(),
                KeyScope::Own,
            )
            .await
            .unwrap();
        assert_eq!(second.objects.len(), 1);
        assert!(!second.is_truncated);
        assert!(second.next_continuation_token.is_none());
    }

    #[tokio::test]
    async fn test_list_max_keys_is_bounded() {
        let store = Arc::new(MemoryObjectStore::default());
        let config = ServiceConfig {
            max_list_keys: 2,
            ..Default::default()
        };
        let service = ObjectService::new(Arc::clone(&store), config);
        seed(&store, &["users/u1/1", "users/u1/2", "users/u1/3"]).await;

        let page = service
            .list(&tenant(), "", Some(500), None, KeyScope::Own)
            .await
            .unwrap();
        assert_eq!(page.objects.len(), 2);
        assert!(page.is_truncated);
    }

    #[tokio::test]
    async fn test_team_scope() {
        let (store, service) = service();
        seed(&store, &["teams/t1/shared.json"]).await;

        let stat = service.stat(&tenant(), "shared.json", KeyScope::Team).await.unwrap();
        assert!(stat.exists);

        let solo = UserContext::cloud("users/u9/", None, 0);
        let result = service.stat(&solo, "shared.json", KeyScope::Team).await;
        assert!(matches!(result, Err(CoreError::Forbidden)));
    }
}
