//! Change feed over server-sent events

use crate::{ApiError, AppState};
use axum::{
    extract::{rejection::QueryRejection, Extension, Query, State},
    response::sse::{Event, Sse},
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use syncgate_core::{ChangeEvent, KeyScope, SubscribeRequest, UserContext};

/// Query of `GET subscribe`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeParams {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub use_team: bool,
    #[serde(default)]
    pub interval_ms: Option<u64>,
}

/// GET /v1/storage/subscribe
///
/// The stream ends when the client disconnects or the server shuts down.
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    query: Result<Query<SubscribeParams>, QueryRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let Query(params) = query?;

    let subscription = state
        .feed
        .subscribe(
            &ctx,
            SubscribeRequest {
                prefix: params.prefix,
                scope: KeyScope::from_use_team(params.use_team),
                interval: params.interval_ms.map(Duration::from_millis),
            },
        )
        .await?;
    tracing::debug!(tenant = %ctx.tenant_key(), "Change feed opened");

    Ok(Sse::new(subscription.map(|event| to_sse(&event))))
}

fn to_sse(event: &ChangeEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.kind.as_str()).json_data(event)
}
