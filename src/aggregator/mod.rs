// Aggregator: sole owner of cross-node state. Reports update per-node current/previous pairs;
// the ticker folds them into aggregates, drives the experiment window, renders and persists.

mod figures;
pub mod window;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant, Interval, interval};

use crate::models::{AggregateSnapshot, DisplayFrame, PerfVector, Report, Snapshot};
use crate::sink::{DisplaySink, RecordSink};

pub use window::{ExperimentWindow, WindowEvent};

/// Store record holding the folded cross-node aggregate.
pub const AGGREGATE_RECORD: &str = "average";

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Ticker period; also the denominator of every "window" figure.
    pub poll_interval: Duration,
    /// Node whose counters delimit the experiment window.
    pub reference_node: String,
    pub experiment_timeout: Duration,
    /// Store record for the folded aggregate. `None` disables aggregate persistence.
    pub aggregate_record: Option<String>,
}

/// Latest two snapshots of one node, in poll order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerNodeState {
    pub current: Snapshot,
    pub previous: Option<Snapshot>,
}

/// Result of an accepted tick.
#[derive(Debug, Clone)]
pub struct TickOutput {
    pub elapsed_secs: f64,
    pub current: AggregateSnapshot,
    pub previous: AggregateSnapshot,
    pub frame: DisplayFrame,
}

pub struct Aggregator {
    config: AggregatorConfig,
    nodes: BTreeMap<String, PerNodeState>,
    window: ExperimentWindow,
    arm_pending: bool,
    last_reference: Option<PerfVector>,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            nodes: BTreeMap::new(),
            window: ExperimentWindow::Idle,
            arm_pending: false,
            last_reference: None,
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Shifts the node's current snapshot to previous and stores the new one.
    pub fn apply_report(&mut self, report: Report) {
        match self.nodes.get_mut(&report.node) {
            Some(state) => {
                state.previous = Some(state.current);
                state.current = report.data;
            }
            None => {
                self.nodes.insert(
                    report.node,
                    PerNodeState {
                        current: report.data,
                        previous: None,
                    },
                );
            }
        }
    }

    /// Records an operator arm request for the next tick. Ignored unless the window is idle.
    pub fn arm(&mut self) -> bool {
        if !self.window.is_idle() {
            return false;
        }
        self.arm_pending = true;
        true
    }

    pub fn window(&self) -> &ExperimentWindow {
        &self.window
    }

    pub fn node_state(&self, node: &str) -> Option<&PerNodeState> {
        self.nodes.get(node)
    }

    /// Runs one aggregation step at `elapsed` since start. Returns `None` until at least one
    /// node has reported twice; only such nodes contribute to either aggregate.
    pub fn tick(&mut self, elapsed: Duration) -> Option<TickOutput> {
        let now = elapsed.as_secs_f64();
        let ready = self
            .nodes
            .values()
            .filter_map(|s| s.previous.as_ref().map(|p| (&s.current, p)))
            .collect::<Vec<_>>();
        let current = AggregateSnapshot::from_snapshots(ready.iter().map(|(c, _)| *c))?;
        let previous = AggregateSnapshot::from_snapshots(ready.iter().map(|(_, p)| *p))?;

        let reference = self
            .nodes
            .get(&self.config.reference_node)
            .map(|s| PerfVector::observe(now, &s.current));
        let was_stopped = self.window.is_stopped();

        let mut armed_now = false;
        if std::mem::take(&mut self.arm_pending) && self.window.is_idle() {
            self.apply(WindowEvent::Arm {
                now_secs: now,
                timeout_secs: self.config.experiment_timeout.as_secs_f64(),
            });
            armed_now = true;
            tracing::info!(
                reference_node = %self.config.reference_node,
                timeout_secs = self.config.experiment_timeout.as_secs(),
                "experiment window armed"
            );
        }
        if let Some(deadline) = self.window.deadline_secs()
            && now >= deadline
        {
            self.apply(WindowEvent::Timeout);
        }
        // The arming tick only sets the baseline.
        if !armed_now
            && let (Some(last), Some(observed)) = (self.last_reference, reference)
        {
            self.apply(WindowEvent::Observe {
                previous: last,
                current: observed,
            });
        }
        if reference.is_some() {
            self.last_reference = reference;
        }

        if !was_stopped && let ExperimentWindow::Stopped { summary } = &self.window {
            match summary {
                Some(s) => tracing::info!(
                    duration_secs = s.duration_secs,
                    throughput = ?s.throughput,
                    confirmation_latency_secs = ?s.confirmation_latency_secs,
                    "experiment window stopped"
                ),
                None => tracing::info!("experiment window stopped without data"),
            }
        }

        let frame = DisplayFrame {
            elapsed_secs: now,
            nodes: current.nodes(),
            figures: figures::compute(
                &current,
                &previous,
                now,
                self.config.poll_interval.as_secs_f64(),
            ),
            experiment: self.window.view(now),
        };
        Some(TickOutput {
            elapsed_secs: now,
            current,
            previous,
            frame,
        })
    }

    fn apply(&mut self, event: WindowEvent) {
        self.window = std::mem::take(&mut self.window).transition(event);
    }
}

/// Channels, sink and render target for the aggregator loop.
pub struct AggregatorDeps<S, D> {
    pub reports: mpsc::Receiver<Report>,
    pub triggers: mpsc::Receiver<()>,
    pub sink: Arc<S>,
    pub display: D,
    pub shutdown_rx: oneshot::Receiver<()>,
}

/// Spawns the loop with a ticker at the configured poll interval.
pub fn spawn<S: RecordSink, D: DisplaySink>(
    aggregator: Aggregator,
    deps: AggregatorDeps<S, D>,
) -> tokio::task::JoinHandle<Aggregator> {
    let mut ticker = interval(aggregator.config().poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tokio::spawn(run(aggregator, deps, ticker))
}

/// Drives the aggregator until shutdown. Pending reports and triggers are drained before a
/// tick is handled. Returns the final state.
pub async fn run<S: RecordSink, D: DisplaySink>(
    mut aggregator: Aggregator,
    deps: AggregatorDeps<S, D>,
    mut ticker: Interval,
) -> Aggregator {
    let AggregatorDeps {
        mut reports,
        mut triggers,
        sink,
        mut display,
        mut shutdown_rx,
    } = deps;
    let started = Instant::now();
    let wall_start = Utc::now();
    let mut reports_open = true;
    let mut triggers_open = true;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            report = reports.recv(), if reports_open => match report {
                Some(report) => aggregator.apply_report(report),
                None => reports_open = false,
            },
            trigger = triggers.recv(), if triggers_open => match trigger {
                Some(()) => {
                    if !aggregator.arm() {
                        tracing::debug!("arm ignored, window already active");
                    }
                }
                None => triggers_open = false,
            },
            at = ticker.tick() => {
                let elapsed = at.saturating_duration_since(started);
                let Some(out) = aggregator.tick(elapsed) else {
                    tracing::debug!("tick skipped, no node has two snapshots yet");
                    continue;
                };
                display.render(&out.frame);
                if let Some(record) = aggregator.config().aggregate_record.as_deref() {
                    let at = record_time(wall_start, elapsed);
                    if let Err(e) = sink.append(record, at, &out.current.folded()).await {
                        tracing::warn!(error = %e, operation = "persist_aggregate", "aggregate point dropped");
                    }
                }
            }
        }
    }
    tracing::debug!("Aggregator shutting down");
    aggregator
}

/// Store timestamps follow the ticker, not the wall clock, so consecutive ticks stay ordered.
fn record_time(wall_start: DateTime<Utc>, elapsed: Duration) -> DateTime<Utc> {
    wall_start + TimeDelta::from_std(elapsed).unwrap_or(TimeDelta::zero())
}
