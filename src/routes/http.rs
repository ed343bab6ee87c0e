// HTTP handlers: version, experiment trigger, dashboard series

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use tokio::sync::mpsc::error::TrySendError;

use super::AppState;
use crate::version::{NAME, VERSION};

/// GET /version — returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// POST /api/experiment/start — same edge trigger as the `x` key.
pub(super) async fn experiment_start_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.trigger_tx.try_send(()) {
        Ok(()) => {
            tracing::info!("experiment start requested over HTTP");
            (
                StatusCode::ACCEPTED,
                axum::Json(serde_json::json!({ "status": "requested" })),
            )
        }
        Err(TrySendError::Full(())) => (
            StatusCode::ACCEPTED,
            axum::Json(serde_json::json!({ "status": "pending" })),
        ),
        Err(TrySendError::Closed(())) => (
            StatusCode::SERVICE_UNAVAILABLE,
            axum::Json(serde_json::json!({ "error": "aggregator not running" })),
        ),
    }
}

/// GET /api/series
pub(super) async fn series_list_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(state.series.info().await)
}

#[derive(Debug, Deserialize)]
pub(super) struct SpanQuery {
    span_secs: Option<u64>,
}

/// GET /api/series/{name}?span_secs=N — consolidated points in (now - span, now].
pub(super) async fn series_range_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<SpanQuery>,
) -> impl IntoResponse {
    let span_secs = query.span_secs.unwrap_or(state.config.dashboard.span_secs);
    let end = Utc::now();
    // Spans reaching past chrono's range cover the whole series.
    let start = i64::try_from(span_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|span| end.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    match state.series.range(&name, start, end).await {
        Some(points) => (
            StatusCode::OK,
            axum::Json(serde_json::json!({
                "name": name,
                "spanSecs": span_secs,
                "points": points,
            })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            axum::Json(serde_json::json!({ "error": format!("unknown series: {}", name) })),
        ),
    }
}
