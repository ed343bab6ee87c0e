// Dashboard series: named TimeSeries fed by the node log follower and the counter tracer,
// read by the /api/series routes. Each series has one writer and any number of readers.

pub mod counter;
pub mod log_tail;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::DashboardConfig;
use crate::reducer;
use crate::timeseries::{Dataset, TimeSeries};

pub const PROPOSER_DELAY: &str = "proposer_delay";
pub const VOTER_DELAY: &str = "voter_delay";
pub const TRANSACTION_DELAY: &str = "transaction_delay";
pub const SOCKET_READ: &str = "socket_read";
pub const SOCKET_WRITE: &str = "socket_write";
pub const POLL_EVENTS: &str = "poll_events";
pub const READABLE_EVENTS: &str = "readable_events";
pub const WRITABLE_EVENTS: &str = "writable_events";
pub const OUTQUEUE_EVENTS: &str = "outqueue_events";
pub const CONFIRM_THROUGHPUT: &str = "confirm_throughput";
pub const CONFIRM_AMOUNT: &str = "confirm_amount";

pub type SharedSeries = Arc<RwLock<TimeSeries>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    /// Boundary timestamp, unix milliseconds.
    pub at_ms: i64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesInfo {
    pub name: String,
    pub title: String,
    pub interval_ms: i64,
    pub points: usize,
}

#[derive(Clone, Default)]
pub struct SeriesRegistry {
    series: BTreeMap<String, SharedSeries>,
}

impl SeriesRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `series` under `name`, replacing any previous series with that name.
    pub fn insert(&mut self, name: &str, series: TimeSeries) {
        self.series
            .insert(name.to_string(), Arc::new(RwLock::new(series)));
    }

    /// The dashboard's fixed set of series.
    pub fn standard(config: &DashboardConfig) -> anyhow::Result<Self> {
        let delay = interval_ms("delay_interval_ms", config.delay_interval_ms)?;
        let socket = interval_ms("socket_interval_ms", config.socket_interval_ms)?;
        let counter = interval_ms("counter_interval_ms", config.counter_interval_ms)?;
        let retention = i64::try_from(config.retention_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "dashboard.retention_secs out of range: {}",
                    config.retention_secs
                )
            })?;

        let mut registry = Self::new();
        for (name, title) in [
            (PROPOSER_DELAY, "Proposer Delay (ms)"),
            (VOTER_DELAY, "Voter Delay (ms)"),
            (TRANSACTION_DELAY, "Transaction Delay (ms)"),
        ] {
            registry.insert(
                name,
                TimeSeries::new(title, reducer::mean, delay).with_retention(retention),
            );
        }
        for (name, title) in [
            (SOCKET_READ, "Socket Read (kbps)"),
            (SOCKET_WRITE, "Socket Write (kbps)"),
            (POLL_EVENTS, "Poll Events (/s)"),
            (READABLE_EVENTS, "Readable Events (/s)"),
            (WRITABLE_EVENTS, "Writable Events (/s)"),
            (OUTQUEUE_EVENTS, "Outgoing Queue Events (/s)"),
        ] {
            registry.insert(
                name,
                TimeSeries::new(title, reducer::sum, socket)
                    .with_gap_fill(reducer::fill_zero)
                    .with_retention(retention),
            );
        }
        registry.insert(
            CONFIRM_THROUGHPUT,
            TimeSeries::new("Confirmation Throughput (tx/s)", reducer::mean, counter)
                .with_retention(retention),
        );
        registry.insert(
            CONFIRM_AMOUNT,
            TimeSeries::new("Confirmed Transactions", reducer::mean, counter)
                .with_retention(retention),
        );
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&SharedSeries> {
        self.series.get(name)
    }

    /// Records into `name`. Returns false when no such series exists.
    pub async fn record(&self, name: &str, value: f64, at: DateTime<Utc>) -> bool {
        match self.series.get(name) {
            Some(series) => {
                series.write().await.record(value, at);
                true
            }
            None => false,
        }
    }

    /// Consolidated points of `name` with `start < t <= end`.
    pub async fn range(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Option<Vec<SeriesPoint>> {
        let series = self.series.get(name)?.read().await;
        let (times, values) = series.range(start, end);
        Some(
            times
                .iter()
                .zip(values)
                .map(|(t, v)| SeriesPoint {
                    at_ms: t.timestamp_millis(),
                    value: *v,
                })
                .collect(),
        )
    }

    pub async fn info(&self) -> Vec<SeriesInfo> {
        let mut out = Vec::with_capacity(self.series.len());
        for (name, series) in &self.series {
            let series = series.read().await;
            out.push(SeriesInfo {
                name: name.clone(),
                title: series.name().to_string(),
                interval_ms: series.interval().num_milliseconds(),
                points: series.len(),
            });
        }
        out
    }
}

fn interval_ms(key: &str, ms: u64) -> anyhow::Result<TimeDelta> {
    i64::try_from(ms)
        .ok()
        .filter(|ms| *ms > 0)
        .and_then(TimeDelta::try_milliseconds)
        .ok_or_else(|| anyhow::anyhow!("dashboard.{} out of range: {}", key, ms))
}
