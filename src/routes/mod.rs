// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::dashboard::SeriesRegistry;
use crate::models::DisplayFrame;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) display_tx: broadcast::Sender<DisplayFrame>,
    pub(crate) trigger_tx: mpsc::Sender<()>,
    pub(crate) series: SeriesRegistry,
    pub(crate) nodes: Arc<Vec<String>>,
    pub(crate) ws_display_connections: Arc<AtomicUsize>,
    pub(crate) config: AppConfig,
}

/// Shared handles the routes read from.
pub struct RouteDeps {
    pub display_tx: broadcast::Sender<DisplayFrame>,
    pub trigger_tx: mpsc::Sender<()>,
    pub series: SeriesRegistry,
    /// Monitored node names, in node-list order.
    pub nodes: Vec<String>,
    pub ws_display_connections: Arc<AtomicUsize>,
}

pub fn app(deps: RouteDeps, config: AppConfig) -> Router {
    let state = AppState {
        display_tx: deps.display_tx,
        trigger_tx: deps.trigger_tx,
        series: deps.series,
        nodes: Arc::new(deps.nodes),
        ws_display_connections: deps.ws_display_connections,
        config,
    };
    Router::new()
        .route("/", get(|| async { "Hello from the telematics logger!" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route(
            "/api/experiment/start",
            post(http::experiment_start_handler),
        ) // POST /api/experiment/start
        .route("/api/series", get(http::series_list_handler)) // GET /api/series
        .route("/api/series/{name}", get(http::series_range_handler)) // GET /api/series/{name}
        .route("/ws/display", get(ws::ws_display)) // WS /ws/display
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
