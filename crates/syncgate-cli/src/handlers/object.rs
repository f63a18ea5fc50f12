//! Object metadata handlers: stat, list and deletes

use crate::{ApiError, AppState};
use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use syncgate_core::{DeletePrefixResult, DeleteResult, KeyScope, ListPage, StatResult, UserContext};

/// Body of `POST stat`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatRequest {
    pub key: String,
    #[serde(default)]
    pub use_team: bool,
}

/// Body of `POST delete`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub key: String,
    #[serde(default)]
    pub tombstone_key: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub use_team: bool,
}

/// Body of `POST delete-prefix`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePrefixRequest {
    pub prefix: String,
    #[serde(default)]
    pub tombstone_key: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub use_team: bool,
}

/// Body of `POST list`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub max_keys: Option<u32>,
    #[serde(default)]
    pub continuation_token: Option<String>,
    #[serde(default)]
    pub use_team: bool,
}

/// POST /v1/storage/stat
pub async fn stat(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    body: Result<Json<StatRequest>, JsonRejection>,
) -> Result<Json<StatResult>, ApiError> {
    let Json(req) = body?;
    let result = state
        .objects
        .stat(&ctx, &req.key, KeyScope::from_use_team(req.use_team))
        .await?;
    Ok(Json(result))
}

/// POST /v1/storage/delete
pub async fn delete_object(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    body: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<DeleteResult>, ApiError> {
    let Json(req) = body?;
    let result = state
        .objects
        .delete(
            &ctx,
            &req.key,
            req.tombstone_key.as_deref(),
            req.deleted_at,
            KeyScope::from_use_team(req.use_team),
        )
        .await?;
    Ok(Json(result))
}

/// POST /v1/storage/delete-prefix
pub async fn delete_prefix(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    body: Result<Json<DeletePrefixRequest>, JsonRejection>,
) -> Result<Json<DeletePrefixResult>, ApiError> {
    let Json(req) = body?;
    let result = state
        .objects
        .delete_prefix(
            &ctx,
            &req.prefix,
            req.tombstone_key.as_deref(),
            req.deleted_at,
            KeyScope::from_use_team(req.use_team),
        )
        .await?;
    Ok(Json(result))
}

/// POST /v1/storage/list
pub async fn list_objects(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    body: Result<Json<ListRequest>, JsonRejection>,
) -> Result<Json<ListPage>, ApiError> {
    let Json(req) = body?;
    let page = state
        .objects
        .list(
            &ctx,
            &req.prefix,
            req.max_keys.map(|n| n as usize),
            req.continuation_token.as_deref(),
            KeyScope::from_use_team(req.use_team),
        )
        .await?;
    Ok(Json(page))
}
