// Node monitors: one polling task per node. Each poll fetches the node's snapshot, persists it
// to the node's own store record and forwards it to the aggregator. Failures skip the poll.

use crate::error::TelemetryError;
use crate::models::{Report, Snapshot};
use crate::node_list::NodeEndpoint;
use crate::sink::RecordSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::interval;
use tracing::Instrument;

/// Fetches and decodes one snapshot.
pub async fn fetch_snapshot(client: &reqwest::Client, url: &str) -> Result<Snapshot, TelemetryError> {
    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Polls `node` every `period` until the report channel closes.
pub async fn run<S: RecordSink>(
    node: NodeEndpoint,
    client: reqwest::Client,
    period: Duration,
    sink: Arc<S>,
    reports: mpsc::Sender<Report>,
) {
    let url = node.telemetry_url();
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tick.tick().await;
        let snapshot = match fetch_snapshot(&client, &url).await {
            Ok(s) => s,
            Err(e @ TelemetryError::Transport(_)) => {
                // Usually the node has not started yet.
                tracing::debug!(error = %e, operation = "fetch_snapshot", "node poll skipped");
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, operation = "fetch_snapshot", "node poll skipped");
                continue;
            }
        };

        if let Err(e) = sink
            .append(&node.name, chrono::Utc::now(), &snapshot.record_values())
            .await
        {
            tracing::warn!(error = %e, operation = "persist_snapshot", "data point dropped");
        }

        let report = Report {
            node: node.name.clone(),
            data: snapshot,
        };
        if reports.send(report).await.is_err() {
            tracing::debug!("aggregator gone, monitor exiting");
            break;
        }
    }
}

/// Spawns one monitor per node into `set`; dropping or aborting the set stops them all.
pub fn spawn_all<S: RecordSink>(
    set: &mut JoinSet<()>,
    nodes: &[NodeEndpoint],
    client: &reqwest::Client,
    period: Duration,
    sink: Arc<S>,
    reports: &mpsc::Sender<Report>,
) {
    for node in nodes {
        let span = tracing::span!(tracing::Level::DEBUG, "monitor", node = %node.name);
        set.spawn(
            run(
                node.clone(),
                client.clone(),
                period,
                sink.clone(),
                reports.clone(),
            )
            .instrument(span),
        );
    }
}
