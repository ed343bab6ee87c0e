// Integration tests: HTTP and WebSocket endpoints

mod common;

use axum_test::TestServer;
use chrono::{TimeDelta, Utc};
use common::TEST_CONFIG;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use telematics::config::AppConfig;
use telematics::dashboard::{self, SeriesRegistry};
use telematics::models::{DisplayFrame, ExperimentView, Figure};
use telematics::routes::{self, RouteDeps};
use tokio::sync::{broadcast, mpsc};

struct Harness {
    app: axum::Router,
    display_tx: broadcast::Sender<DisplayFrame>,
    trigger_rx: mpsc::Receiver<()>,
    series: SeriesRegistry,
}

fn test_app() -> Harness {
    let config = AppConfig::load_from_str(TEST_CONFIG).unwrap();
    let (display_tx, _) = broadcast::channel(config.publishing.broadcast_capacity);
    let (trigger_tx, trigger_rx) = mpsc::channel(1);
    let series = SeriesRegistry::standard(&config.dashboard).unwrap();
    let app = routes::app(
        RouteDeps {
            display_tx: display_tx.clone(),
            trigger_tx,
            series: series.clone(),
            nodes: vec!["node_0".into(), "node_1".into()],
            ws_display_connections: Arc::new(AtomicUsize::new(0)),
        },
        config,
    );
    Harness {
        app,
        display_tx,
        trigger_rx,
        series,
    }
}

fn sample_frame() -> DisplayFrame {
    DisplayFrame {
        elapsed_secs: 12.0,
        nodes: 2,
        figures: vec![Figure {
            key: "confirmed_tx".into(),
            label: "Confirmed Transactions".into(),
            overall: Some(40.0),
            window: None,
        }],
        experiment: ExperimentView::Running {
            remaining_secs: 250.0,
        },
    }
}

#[tokio::test]
async fn test_root_endpoint() {
    let h = test_app();
    let server = TestServer::new(h.app);
    let response = server.get("/").await;
    response.assert_status_ok();
    response.assert_text("Hello from the telematics logger!");
}

#[tokio::test]
async fn test_version_endpoint() {
    let h = test_app();
    let server = TestServer::new(h.app);
    let response = server.get("/version").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(
        json.get("name").and_then(|v| v.as_str()),
        Some("telematics")
    );
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_experiment_start_is_edge_triggered() {
    let mut h = test_app();
    let server = TestServer::new(h.app);

    let response = server.post("/api/experiment/start").await;
    response.assert_status(axum::http::StatusCode::ACCEPTED);
    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "requested");

    // The first request has not been consumed yet.
    let response = server.post("/api/experiment/start").await;
    response.assert_status(axum::http::StatusCode::ACCEPTED);
    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "pending");

    assert_eq!(h.trigger_rx.try_recv(), Ok(()));
    assert!(h.trigger_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_experiment_start_without_aggregator() {
    let h = test_app();
    drop(h.trigger_rx);
    let server = TestServer::new(h.app);
    let response = server.post("/api/experiment/start").await;
    response.assert_status(axum::http::StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_series_list() {
    let h = test_app();
    let server = TestServer::new(h.app);
    let response = server.get("/api/series").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s["name"].as_str())
        .collect();
    assert_eq!(names.len(), 11);
    assert!(names.contains(&dashboard::PROPOSER_DELAY));
    assert!(names.contains(&dashboard::SOCKET_READ));
    assert!(names.contains(&dashboard::CONFIRM_THROUGHPUT));
}

#[tokio::test]
async fn test_series_range_returns_consolidated_points() {
    let h = test_app();
    let now = Utc::now();
    // 250 ms mean series: the third sample closes the first interval.
    h.series
        .record(dashboard::PROPOSER_DELAY, 10.0, now - TimeDelta::milliseconds(2000))
        .await;
    h.series
        .record(dashboard::PROPOSER_DELAY, 20.0, now - TimeDelta::milliseconds(1900))
        .await;
    h.series
        .record(dashboard::PROPOSER_DELAY, 90.0, now - TimeDelta::milliseconds(1500))
        .await;

    let server = TestServer::new(h.app);
    let response = server
        .get("/api/series/proposer_delay")
        .add_query_param("span_secs", 60)
        .await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["name"], "proposer_delay");
    assert_eq!(json["spanSecs"], 60);
    let points = json["points"].as_array().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["value"].as_f64(), Some(15.0));
}

#[tokio::test]
async fn test_series_range_with_span_beyond_date_range() {
    let h = test_app();
    let now = Utc::now();
    for (ms, value) in [(2000, 10.0), (1500, 30.0)] {
        h.series
            .record(dashboard::PROPOSER_DELAY, value, now - TimeDelta::milliseconds(ms))
            .await;
    }

    let server = TestServer::new(h.app);
    for span in [100_000_000_000_000u64, u64::MAX] {
        let response = server
            .get("/api/series/proposer_delay")
            .add_query_param("span_secs", span)
            .await;
        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["spanSecs"], span);
        let points = json["points"].as_array().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0]["value"], 10.0);
    }
}

#[tokio::test]
async fn test_series_unknown_name() {
    let h = test_app();
    let server = TestServer::new(h.app);
    let response = server.get("/api/series/nope").await;
    response.assert_status_not_found();
}

// --- WebSocket message tests (require http_transport + ws feature) ---
// Receive until we get valid JSON of the wanted shape (server sends a welcome first).

async fn receive_first_json_text<T: serde::de::DeserializeOwned>(
    ws: &mut axum_test::TestWebSocket,
) -> T {
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(3);
    loop {
        let text = ws.receive_text().await;
        if let Ok(v) = serde_json::from_str::<T>(&text) {
            return v;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for JSON"
        );
    }
}

#[tokio::test]
async fn test_ws_display_sends_welcome() {
    let h = test_app();
    let server = TestServer::builder().http_transport().build(h.app);
    let mut ws = server
        .get_websocket("/ws/display")
        .await
        .into_websocket()
        .await;
    let welcome: serde_json::Value = receive_first_json_text(&mut ws).await;
    assert_eq!(welcome["type"], "info");
    assert_eq!(welcome["referenceNode"], "node_0");
    assert_eq!(welcome["nodes"], serde_json::json!(["node_0", "node_1"]));
}

#[tokio::test]
async fn test_ws_display_receives_broadcast_frame() {
    let h = test_app();
    let server = TestServer::builder().http_transport().build(h.app);
    let mut ws = server
        .get_websocket("/ws/display")
        .await
        .into_websocket()
        .await;
    let tx = h.display_tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        let _ = tx.send(sample_frame());
    });
    let received: DisplayFrame = receive_first_json_text(&mut ws).await;
    assert_eq!(received, sample_frame());
    assert_eq!(received.figure("confirmed_tx").unwrap().window, None);
}
