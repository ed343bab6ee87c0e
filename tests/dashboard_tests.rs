// Dashboard series: log parsing, log following, counter tracing, registry

use axum::{Router, routing::get};
use chrono::{DateTime, TimeDelta, Utc};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use telematics::config::DashboardConfig;
use telematics::dashboard::log_tail::{LogEvent, LogParser, LogTracker, follow};
use telematics::dashboard::{self, SeriesRegistry, counter};
use telematics::node_list::TELEMETRY_PATH;
use telematics::timeseries::Dataset;

fn at(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap() + TimeDelta::milliseconds(ms)
}

async fn pending(registry: &SeriesRegistry, name: &str) -> usize {
    registry.get(name).unwrap().read().await.pending()
}

#[test]
fn parser_extracts_delays_and_socket_bytes() {
    let p = LogParser::new().unwrap();
    assert_eq!(
        p.parse("INFO Received Proposer block, delay=120 ms"),
        vec![LogEvent::ProposerDelay(120.0)]
    );
    assert_eq!(
        p.parse("Received Voter block, delay=7 ms"),
        vec![LogEvent::VoterDelay(7.0)]
    );
    assert_eq!(
        p.parse("Received Transaction block, delay=33 ms"),
        vec![LogEvent::TransactionDelay(33.0)]
    );
    assert_eq!(
        p.parse("Read 1500 bytes from socket"),
        vec![LogEvent::SocketRead(1500.0)]
    );
    assert_eq!(
        p.parse("Wrote 64 bytes to socket"),
        vec![LogEvent::SocketWrite(64.0)]
    );
    assert!(p.parse("nothing to see here").is_empty());
}

#[test]
fn parser_event_patterns_are_not_exclusive() {
    let p = LogParser::new().unwrap();
    assert_eq!(
        p.parse("New polling results received; Peer 3 readable; Peer 3 writable"),
        vec![LogEvent::Poll, LogEvent::Readable, LogEvent::Writable]
    );
    assert_eq!(
        p.parse("Peer 12 outgoing queue readable"),
        vec![LogEvent::OutqueueReadable]
    );
}

#[test]
fn parser_delay_match_ends_the_line() {
    let p = LogParser::new().unwrap();
    assert_eq!(
        p.parse("Received Proposer block, delay=5 ms New polling results received"),
        vec![LogEvent::ProposerDelay(5.0)]
    );
}

#[tokio::test]
async fn standard_registry_has_all_series() {
    let registry = SeriesRegistry::standard(&DashboardConfig::default()).unwrap();
    assert_eq!(registry.info().await.len(), 11);
    for name in [
        dashboard::PROPOSER_DELAY,
        dashboard::VOTER_DELAY,
        dashboard::TRANSACTION_DELAY,
        dashboard::SOCKET_READ,
        dashboard::SOCKET_WRITE,
        dashboard::POLL_EVENTS,
        dashboard::READABLE_EVENTS,
        dashboard::WRITABLE_EVENTS,
        dashboard::OUTQUEUE_EVENTS,
        dashboard::CONFIRM_THROUGHPUT,
        dashboard::CONFIRM_AMOUNT,
    ] {
        assert!(registry.get(name).is_some(), "{name}");
    }
}

#[test]
fn standard_registry_rejects_out_of_range_intervals() {
    let zero = DashboardConfig {
        delay_interval_ms: 0,
        ..DashboardConfig::default()
    };
    let err = SeriesRegistry::standard(&zero).err().unwrap();
    assert!(err.to_string().contains("dashboard.delay_interval_ms"));

    let huge = DashboardConfig {
        counter_interval_ms: u64::MAX,
        ..DashboardConfig::default()
    };
    let err = SeriesRegistry::standard(&huge).err().unwrap();
    assert!(err.to_string().contains("dashboard.counter_interval_ms"));
}

#[tokio::test]
async fn socket_series_history_is_bounded_by_retention() {
    let config = DashboardConfig {
        retention_secs: 1,
        ..DashboardConfig::default()
    };
    let registry = SeriesRegistry::standard(&config).unwrap();
    registry.record(dashboard::SOCKET_READ, 8.0, at(0)).await;
    // An hour of silence on a 10 ms zero-filled series.
    registry.record(dashboard::SOCKET_READ, 8.0, at(3_600_000)).await;

    let info = registry.info().await;
    let read = info
        .iter()
        .find(|i| i.name == dashboard::SOCKET_READ)
        .unwrap();
    assert_eq!(read.points, 100);
    let points = registry
        .range(dashboard::SOCKET_READ, at(0), at(3_600_000))
        .await
        .unwrap();
    assert_eq!(points.len(), 100);
    assert!(points.iter().all(|p| p.value == 0.0));
    assert_eq!(points[0].at_ms, at(3_599_000).timestamp_millis());
}

#[tokio::test]
async fn registry_record_and_range() {
    let registry = SeriesRegistry::standard(&DashboardConfig::default()).unwrap();
    assert!(!registry.record("missing", 1.0, at(0)).await);
    assert!(registry.range("missing", at(0), at(1)).await.is_none());

    // 1000 ms mean series
    registry.record(dashboard::CONFIRM_AMOUNT, 10.0, at(0)).await;
    registry.record(dashboard::CONFIRM_AMOUNT, 30.0, at(500)).await;
    registry.record(dashboard::CONFIRM_AMOUNT, 50.0, at(1200)).await;

    let points = registry
        .range(dashboard::CONFIRM_AMOUNT, at(0), at(5000))
        .await
        .unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].at_ms, at(1000).timestamp_millis());
    assert_eq!(points[0].value, 20.0);

    let info = registry.info().await;
    let amount = info
        .iter()
        .find(|i| i.name == dashboard::CONFIRM_AMOUNT)
        .unwrap();
    assert_eq!(amount.points, 1);
    assert_eq!(amount.interval_ms, 1000);
}

#[tokio::test]
async fn tracker_scales_socket_bytes_and_events() {
    let registry = SeriesRegistry::standard(&DashboardConfig::default()).unwrap();
    let tracker = LogTracker::new(registry.clone(), 10).unwrap();

    tracker.ingest("Read 1000 bytes from socket", at(0)).await;
    tracker.ingest("Read 500 bytes from socket", at(5)).await;
    tracker.ingest("Peer 1 readable", at(0)).await;
    tracker.ingest("Peer 1 readable", at(5)).await;
    // Crossing samples close the first 10 ms interval of each series.
    tracker.ingest("Read 1 bytes from socket", at(15)).await;
    tracker.ingest("Peer 2 readable", at(15)).await;

    let read = registry
        .range(dashboard::SOCKET_READ, at(0), at(100))
        .await
        .unwrap();
    // 1500 bytes in 10 ms = 1200 kbit/s
    assert_eq!(read.len(), 1);
    assert!((read[0].value - 1200.0).abs() < 1e-9);

    let readable = registry
        .range(dashboard::READABLE_EVENTS, at(0), at(100))
        .await
        .unwrap();
    // two events in 10 ms = 200 events/s
    assert_eq!(readable[0].value, 200.0);
    assert_eq!(pending(&registry, dashboard::WRITABLE_EVENTS).await, 0);
}

#[tokio::test]
async fn follow_waits_for_file_and_reads_appended_lines() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("0.log");
    let registry = SeriesRegistry::standard(&DashboardConfig::default()).unwrap();
    let tracker = LogTracker::new(registry.clone(), 10).unwrap();
    let handle = tokio::spawn(follow(path.clone(), tracker, Duration::from_millis(10)));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "Received Proposer block, delay=10 ms").unwrap();
    writeln!(file, "Received Voter block, delay=20 ms").unwrap();
    file.flush().unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while pending(&registry, dashboard::VOTER_DELAY).await == 0 {
        assert!(tokio::time::Instant::now() < deadline, "lines not ingested");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(pending(&registry, dashboard::PROPOSER_DELAY).await, 1);

    // A partial line is held until its newline arrives.
    write!(file, "Received Transaction block, ").unwrap();
    file.flush().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(pending(&registry, dashboard::TRANSACTION_DELAY).await, 0);
    writeln!(file, "delay=30 ms").unwrap();
    file.flush().unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while pending(&registry, dashboard::TRANSACTION_DELAY).await == 0 {
        assert!(tokio::time::Instant::now() < deadline, "partial line not completed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.abort();
}

#[tokio::test]
async fn trace_counter_records_amount_and_throughput() {
    let count = Arc::new(AtomicU64::new(0));
    let served = count.clone();
    let app = Router::new().route(
        TELEMETRY_PATH,
        get(move || {
            let served = served.clone();
            async move {
                let n = served.fetch_add(10, Ordering::SeqCst) + 10;
                axum::Json(serde_json::json!({ "confirmed_transactions": n }))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let registry = SeriesRegistry::standard(&DashboardConfig::default()).unwrap();
    let handle = tokio::spawn(counter::trace_counter(
        reqwest::Client::new(),
        format!("http://{}{}", addr, TELEMETRY_PATH),
        registry.clone(),
        Duration::from_millis(20),
    ));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while pending(&registry, dashboard::CONFIRM_THROUGHPUT).await < 2 {
        assert!(tokio::time::Instant::now() < deadline, "counter not traced");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.abort();

    // The first poll only sets the baseline, so amount runs one sample ahead (or level if
    // the abort landed between the two records).
    let amount = pending(&registry, dashboard::CONFIRM_AMOUNT).await;
    let throughput = pending(&registry, dashboard::CONFIRM_THROUGHPUT).await;
    assert!((throughput..=throughput + 1).contains(&amount));
    let series = registry.get(dashboard::CONFIRM_THROUGHPUT).unwrap().read().await;
    assert_eq!(series.name(), "Confirmation Throughput (tx/s)");
}
