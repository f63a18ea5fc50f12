//! HTTP route definitions

use crate::{handlers, middleware, AppState};
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Base path of the storage API
pub const API_BASE: &str = "/v1/storage";

/// Create the main router
///
/// Spawns the rate limiter pruning task, so it must run inside a tokio runtime.
pub fn create_router(state: Arc<AppState>) -> Router {
    // Create rate limiter
    let rate_limiter = middleware::create_rate_limiter(state.config.rate_limit_rps);
    middleware::spawn_limiter_pruning(
        Arc::clone(&rate_limiter),
        state.shutdown.clone(),
        middleware::LIMITER_PRUNE_INTERVAL,
    );

    // Authenticated storage API; the rate limiter runs after auth so it
    // can key on the tenant
    let api = Router::new()
        .route("/stat", post(handlers::stat))
        .route("/presign-upload", post(handlers::presign_upload))
        .route("/presign-download", post(handlers::presign_download))
        .route("/presign-upload-batch", post(handlers::presign_upload_batch))
        .route("/presign-download-batch", post(handlers::presign_download_batch))
        .route("/delete", post(handlers::delete_object))
        .route("/delete-prefix", post(handlers::delete_prefix))
        .route("/list", post(handlers::list_objects))
        .route("/subscribe", get(handlers::subscribe))
        .route_layer(axum_middleware::from_fn_with_state(
            rate_limiter,
            middleware::rate_limit_middleware,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::auth_middleware,
        ));

    Router::new()
        // Service endpoints
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .nest(API_BASE, api)
        // Apply middleware
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(cors_layer(&state.config.cors_origins, state.config.cors_enabled))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .with_state(state)
}

/// CORS configuration; a disabled layer allows no origins
fn cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        return CorsLayer::new();
    }

    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(allowed)
}
