use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use telematics::*;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

/// Poll period of the log follower when it is waiting for the file or for new lines.
const LOG_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Grace period for runtime shutdown; a blocking stdin read cannot be cancelled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run());
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout belongs to the terminal display
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let app_config = config::AppConfig::load()?;
    let logger = &app_config.logger;
    let nodes = node_list::load(&logger.node_list)
        .map_err(|e| anyhow::anyhow!("node list {}: {}", logger.node_list, e))?;
    if !nodes.iter().any(|n| n.name == logger.reference_node) {
        tracing::warn!(
            reference_node = %logger.reference_node,
            "reference node is not in the node list; experiment windows will never start"
        );
    }
    tracing::info!(nodes = nodes.len(), "node list loaded");

    let store = Arc::new(store::RoundRobinStore::connect(&app_config.store.path).await?);
    store.init().await?;
    for node in &nodes {
        store
            .create_record(&node.name, logger.interval_secs, logger.ring_capacity())
            .await?;
    }
    if logger.aggregate {
        store
            .create_record(
                aggregator::AGGREGATE_RECORD,
                logger.interval_secs,
                logger.ring_capacity(),
            )
            .await?;
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(logger.request_timeout_ms))
        .build()?;
    let poll_interval = Duration::from_secs(logger.interval_secs);

    let (report_tx, report_rx) = mpsc::channel(logger.report_channel_capacity);
    // One slot: a pending arm absorbs repeats until the aggregator takes it.
    let (trigger_tx, trigger_rx) = mpsc::channel::<()>(1);
    let (display_tx, _) =
        broadcast::channel::<models::DisplayFrame>(app_config.publishing.broadcast_capacity);

    let mut monitors = JoinSet::new();
    monitor::spawn_all(
        &mut monitors,
        &nodes,
        &client,
        poll_interval,
        store.clone(),
        &report_tx,
    );
    drop(report_tx);
    // Restores the terminal when dropped at the end of `run`.
    let trigger_input = trigger::spawn_trigger_input(trigger_tx.clone())?;

    let dashboard = app_config.dashboard.clone();
    let series = if dashboard.enabled {
        dashboard::SeriesRegistry::standard(&dashboard)?
    } else {
        dashboard::SeriesRegistry::new()
    };
    let mut dashboard_tasks = JoinSet::new();
    if dashboard.enabled {
        let tracker =
            dashboard::log_tail::LogTracker::new(series.clone(), dashboard.socket_interval_ms)?;
        dashboard_tasks.spawn(dashboard::log_tail::follow(
            dashboard.log_path.clone().into(),
            tracker,
            LOG_POLL_INTERVAL,
        ));
        if let Some(counter_node) = &dashboard.counter_node {
            match nodes.iter().find(|n| &n.name == counter_node) {
                Some(node) => {
                    dashboard_tasks.spawn(dashboard::counter::trace_counter(
                        client.clone(),
                        node.telemetry_url(),
                        series.clone(),
                        Duration::from_millis(dashboard.counter_interval_ms),
                    ));
                }
                None => tracing::warn!(
                    counter_node = %counter_node,
                    "dashboard counter node is not in the node list; throughput series disabled"
                ),
            }
        }
    }

    let mut display: Vec<Box<dyn sink::DisplaySink>> =
        vec![Box::new(sink::BroadcastDisplay::new(display_tx.clone()))];
    if app_config.publishing.terminal {
        display.push(Box::new(sink::TerminalDisplay::stdout()));
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let aggregator_handle = aggregator::spawn(
        aggregator::Aggregator::new(aggregator::AggregatorConfig {
            poll_interval,
            reference_node: logger.reference_node.clone(),
            experiment_timeout: Duration::from_secs(logger.experiment_timeout_secs),
            aggregate_record: logger
                .aggregate
                .then(|| aggregator::AGGREGATE_RECORD.to_string()),
        }),
        aggregator::AggregatorDeps {
            reports: report_rx,
            triggers: trigger_rx,
            sink: store.clone(),
            display,
            shutdown_rx,
        },
    );

    let app = routes::app(
        routes::RouteDeps {
            display_tx,
            trigger_tx,
            series,
            nodes: nodes.iter().map(|n| n.name.clone()).collect(),
            ws_display_connections: Arc::new(AtomicUsize::new(0)),
        },
        app_config.clone(),
    );
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    let trigger::TriggerInput {
        task: trigger_task,
        raw: _raw_terminal,
    } = trigger_input;
    // Raw mode swallows SIGINT; Ctrl-C comes back from the key loop instead.
    let interrupted = async move {
        if !matches!(trigger_task.await, Ok(trigger::KeysClosed::Interrupt)) {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        tokio::select! {
                            _ = tokio::signal::ctrl_c() => {}
                            _ = interrupted => {}
                        }
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                    _ = interrupted => {}
                }
            }
            #[cfg(not(unix))]
            {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = interrupted => {}
                }
            }
        } => {
            tracing::info!("Received shutdown signal");
            monitors.abort_all();
            dashboard_tasks.abort_all();
            let _ = shutdown_tx.send(());
            let _ = aggregator_handle.await;
        }
    }

    Ok(())
}
