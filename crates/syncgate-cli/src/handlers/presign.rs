//! Presigned URL handlers

use crate::{ApiError, AppState};
use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use syncgate_core::{KeyScope, PresignedItem, PresignedUrl, UploadItem, UserContext};

/// Body of `POST presign-upload`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignUploadRequest {
    pub key: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub use_team: bool,
}

/// Body of `POST presign-download`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignDownloadRequest {
    pub key: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub use_team: bool,
}

/// Body of `POST presign-upload-batch`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignUploadBatchRequest {
    pub items: Vec<UploadItem>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub use_team: bool,
}

/// Body of `POST presign-download-batch`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignDownloadBatchRequest {
    pub keys: Vec<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub use_team: bool,
}

/// Batch presign response
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub items: Vec<PresignedItem>,
}

/// POST /v1/storage/presign-upload
pub async fn presign_upload(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    body: Result<Json<PresignUploadRequest>, JsonRejection>,
) -> Result<Json<PresignedUrl>, ApiError> {
    let Json(req) = body?;
    let presigned = state
        .objects
        .presign_upload(
            &ctx,
            &req.key,
            req.content_type.as_deref(),
            req.expires_in,
            KeyScope::from_use_team(req.use_team),
        )
        .await?;
    Ok(Json(presigned))
}

/// POST /v1/storage/presign-download
pub async fn presign_download(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    body: Result<Json<PresignDownloadRequest>, JsonRejection>,
) -> Result<Json<PresignedUrl>, ApiError> {
    let Json(req) = body?;
    let presigned = state
        .objects
        .presign_download(&ctx, &req.key, req.expires_in, KeyScope::from_use_team(req.use_team))
        .await?;
    Ok(Json(presigned))
}

/// POST /v1/storage/presign-upload-batch
pub async fn presign_upload_batch(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    body: Result<Json<PresignUploadBatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let Json(req) = body?;
    let items = state
        .objects
        .presign_upload_batch(&ctx, &req.items, req.expires_in, KeyScope::from_use_team(req.use_team))
        .await?;
    Ok(Json(BatchResponse { items }))
}

/// POST /v1/storage/presign-download-batch
pub async fn presign_download_batch(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    body: Result<Json<PresignDownloadBatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let Json(req) = body?;
    let items = state
        .objects
        .presign_download_batch(&ctx, &req.keys, req.expires_in, KeyScope::from_use_team(req.use_team))
        .await?;
    Ok(Json(BatchResponse { items }))
}
