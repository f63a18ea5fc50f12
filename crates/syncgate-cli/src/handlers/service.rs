//! Service-level handlers (liveness, readiness)

use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use syncgate_store::ObjectStore;

/// Readiness report
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub storage: &'static str,
}

/// GET /health - Liveness check
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /ready - Storage connectivity check
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> Response {
    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready",
                storage: "ok",
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    status: "unavailable",
                    storage: "unreachable",
                }),
            )
                .into_response()
        }
    }
}
