//! S3-compatible object store backed by `aws-sdk-s3`

use crate::{ObjectInfo, ObjectListing, ObjectStore, Result, StoreError, MAX_DELETE_BATCH, MAX_LIST_PAGE};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, DateTime as SmithyDateTime};
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// S3 backend configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct S3Config {
    /// Bucket holding all tenant data
    pub bucket: String,
    /// Region (falls back to the AWS environment)
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...)
    pub endpoint: Option<String>,
    /// Static access key id
    pub access_key_id: Option<String>,
    /// Static secret access key
    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,
    /// Use path-style addressing
    pub force_path_style: bool,
}

impl S3Config {
    /// Check the configuration before building a client
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(StoreError::Configuration("bucket must be set".to_string()));
        }
        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(StoreError::Configuration(
                "access key id and secret access key must be set together".to_string(),
            ));
        }
        Ok(())
    }
}

/// Object store backed by an S3-compatible service
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client from configuration
    pub async fn new(config: S3Config) -> Result<Self> {
        config.validate()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = config.region.clone() {
            loader = loader.region(Region::new(region));
        }
        if let Some(endpoint) = config.endpoint.clone() {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(access_key), Some(secret)) =
            (config.access_key_id.clone(), config.secret_access_key.clone())
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret,
                None,
                None,
                "syncgate-static",
            ));
        }
        let shared_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        debug!(bucket = %config.bucket, endpoint = ?config.endpoint, "S3 client configured");

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket,
        })
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn to_chrono(dt: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

fn backend_error<E, R>(op: &str, err: SdkError<E, R>) -> StoreError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    StoreError::Backend(format!("{}: {}", op, DisplayErrorContext(&err)))
}

fn is_not_found(err: &SdkError<HeadObjectError, impl std::fmt::Debug>) -> bool {
    err.as_service_error().is_some_and(HeadObjectError::is_not_found)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(output) => Ok(Some(ObjectInfo {
                key: key.to_string(),
                size: output.content_length().unwrap_or(0).max(0) as u64,
                last_modified: output
                    .last_modified()
                    .and_then(to_chrono)
                    .unwrap_or_else(Utc::now),
            })),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(backend_error("head_object", err)),
        }
    }

    async fn list(
        &self,
        prefix: &str,
        max_keys: usize,
        continuation_token: Option<&str>,
    ) -> Result<ObjectListing> {
        let max_keys = max_keys.clamp(1, MAX_LIST_PAGE) as i32;
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(max_keys)
            .set_continuation_token(continuation_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| backend_error("list_objects_v2", e))?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                Some(ObjectInfo {
                    key: object.key()?.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    last_modified: object
                        .last_modified()
                        .and_then(to_chrono)
                        .unwrap_or_else(Utc::now),
                })
            })
            .collect();

        let next_continuation_token = output.next_continuation_token().map(str::to_string);
        Ok(ObjectListing {
            objects,
            is_truncated: output.is_truncated().unwrap_or(false) && next_continuation_token.is_some(),
            next_continuation_token,
        })
    }

    async fn put(&self, key: &str, body: Bytes, content_type: Option<&str>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(|e| backend_error("put_object", e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| backend_error("delete_object", e))?;
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        if keys.len() > MAX_DELETE_BATCH {
            return Err(StoreError::InvalidRequest(format!(
                "at most {} keys per delete",
                MAX_DELETE_BATCH
            )));
        }

        let identifiers = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| StoreError::InvalidRequest(e.to_string()))?;
        let delete = Delete::builder()
            .set_objects(Some(identifiers))
            .quiet(true)
            .build()
            .map_err(|e| StoreError::InvalidRequest(e.to_string()))?;

        let output = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| backend_error("delete_objects", e))?;

        // Quiet mode only reports failures
        for error in output.errors() {
            warn!(
                key = error.key().unwrap_or_default(),
                code = error.code().unwrap_or_default(),
                "Failed to delete object"
            );
        }
        Ok(keys.len().saturating_sub(output.errors().len()))
    }

    async fn presign_put(
        &self,
        key: &str,
        content_type: Option<&str>,
        expires_in: Duration,
    ) -> Result<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StoreError::InvalidRequest(e.to_string()))?;
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .presigned(presigning)
            .await
            .map_err(|e| backend_error("presign put_object", e))?;
        Ok(request.uri().to_string())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StoreError::InvalidRequest(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| backend_error("presign get_object", e))?;
        Ok(request.uri().to_string())
    }

    async fn health_check(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| backend_error("head_bucket", e))?;
        Ok(())
    }
}
