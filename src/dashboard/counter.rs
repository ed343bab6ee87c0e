// Counter tracer: polls one node's confirmed-transaction counter into the throughput series.

use chrono::Utc;
use tokio::time::{Duration, Instant, interval};

use super::{CONFIRM_AMOUNT, CONFIRM_THROUGHPUT, SeriesRegistry};
use crate::monitor::fetch_snapshot;

/// Confirmed count and the instant it was read.
#[derive(Debug, Clone, Copy)]
struct Baseline {
    at: Instant,
    confirmed: u64,
}

/// Polls `url` every `period` until the task is aborted. The first successful poll only sets
/// the baseline for the throughput series.
pub async fn trace_counter(
    client: reqwest::Client,
    url: String,
    registry: SeriesRegistry,
    period: Duration,
) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut baseline: Option<Baseline> = None;

    loop {
        tick.tick().await;
        let snapshot = match fetch_snapshot(&client, &url).await {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(error = %e, operation = "trace_counter", "counter poll skipped");
                continue;
            }
        };
        let now = Instant::now();
        let wall = Utc::now();
        let confirmed = snapshot.confirmed_transactions;

        if let Some(last) = baseline {
            let secs = now.saturating_duration_since(last.at).as_secs_f64();
            if let Some(rate) = crate::models::ratio(confirmed as f64 - last.confirmed as f64, secs) {
                registry.record(CONFIRM_THROUGHPUT, rate, wall).await;
            }
        }
        registry.record(CONFIRM_AMOUNT, confirmed as f64, wall).await;
        baseline = Some(Baseline { at: now, confirmed });
    }
}
