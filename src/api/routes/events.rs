//! Event Routes
//!
//! - POST /api/v1/events - Publish a JSON document to every subscriber
//! - GET /api/v1/state - Current state snapshot
//! - GET /api/v1/stats - Broadcaster counters

use axum::{extract::State, http::StatusCode, Json};
use serde_json::Value;
use std::sync::Arc;

use crate::api::dto::PublishResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::events::BroadcasterStats;

/// POST /api/v1/events
///
/// The body is broadcast verbatim. Waits only for room in the event source,
/// never for subscribers.
pub async fn publish_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<Value>,
) -> ApiResult<(StatusCode, Json<PublishResponse>)> {
    state
        .publisher
        .send(event)
        .await
        .map_err(|_| ApiError::ServiceUnavailable("Event source closed".to_string()))?;

    tracing::debug!("Event accepted for broadcast");

    Ok((
        StatusCode::ACCEPTED,
        Json(PublishResponse {
            status: "accepted".to_string(),
        }),
    ))
}

/// GET /api/v1/state
pub async fn get_state(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let snapshot = state.broadcaster.snapshot().await?;
    Ok(Json(snapshot))
}

/// GET /api/v1/stats
pub async fn get_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<BroadcasterStats>> {
    let stats = state.broadcaster.stats().await?;
    Ok(Json(stats))
}
