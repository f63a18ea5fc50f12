//! HTTP middleware for authentication, rate limiting, etc.

use crate::{ApiError, AppState};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use governor::{state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use syncgate_core::UserContext;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Header carrying the request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Rate limiter type
pub type KeyedRateLimiter =
    RateLimiter<String, DefaultKeyedStateStore<String>, governor::clock::DefaultClock>;

tokio::task_local! {
    static REQUEST_ID: String;
}

/// Create a rate limiter
pub fn create_rate_limiter(requests_per_second: u32) -> Arc<KeyedRateLimiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::keyed(quota))
}

/// How often idle tenants are dropped from the rate limiter
pub const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically forget tenants whose rate limit budget has fully refilled,
/// until `shutdown` fires
pub fn spawn_limiter_pruning(
    limiter: Arc<KeyedRateLimiter>,
    shutdown: CancellationToken,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    limiter.retain_recent();
                    limiter.shrink_to_fit();
                    tracing::trace!(tenants = limiter.len(), "Pruned rate limiter");
                }
            }
        }
    })
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let ctx = state.resolver.resolve(auth_header)?;

    // Store the context in request extensions
    request.extensions_mut().insert(ctx);

    Ok(next.run(request).await)
}

/// Rate limiting middleware, keyed by tenant
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<KeyedRateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let tenant = request
        .extensions()
        .get::<UserContext>()
        .map(|ctx| ctx.tenant_key().to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    if limiter.check_key(&tenant).is_err() {
        tracing::debug!(tenant = %tenant, "Rate limited");
        return Err(ApiError::rate_limited());
    }

    Ok(next.run(request).await)
}

/// Request ID middleware - adds x-request-id header
///
/// A well-formed incoming id is reused so callers can correlate logs.
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|id| is_acceptable_id(id))
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = REQUEST_ID.scope(request_id.clone(), next.run(request)).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn is_acceptable_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Request id of the request being handled, if any
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok()
}

/// Request ID extension
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    // Path only; query strings may carry tenant prefixes
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        path = %path,
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        request_id = current_request_id().as_deref().unwrap_or("-"),
        "Request completed"
    );

    response
}
