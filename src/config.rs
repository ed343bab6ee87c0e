use serde::Deserialize;

/// Upper bound for dashboard consolidation intervals (one day).
pub const MAX_SERIES_INTERVAL_MS: u64 = 86_400_000;
/// Upper bound for dashboard history (one week).
pub const MAX_RETENTION_SECS: u64 = 604_800;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logger: LoggerConfig,
    pub store: StoreConfig,
    pub publishing: PublishingConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggerConfig {
    /// CSV node list: `name,_,ip,_,_,port` per line.
    pub node_list: String,
    /// Poll and aggregation cadence.
    pub interval_secs: u64,
    /// Logging horizon; together with `interval_secs` it sizes each store ring.
    pub duration_secs: u64,
    /// Node whose confirmed-transaction counter delimits experiment windows.
    pub reference_node: String,
    #[serde(default = "default_experiment_timeout_secs")]
    pub experiment_timeout_secs: u64,
    /// Persist the cross-node aggregate as its own record.
    #[serde(default = "default_true")]
    pub aggregate: bool,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_report_channel_capacity")]
    pub report_channel_capacity: usize,
}

fn default_experiment_timeout_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_ms() -> u64 {
    2000
}

fn default_report_channel_capacity() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Max number of display frames kept in the broadcast channel for /ws/display (slow clients may lag).
    pub broadcast_capacity: usize,
    /// Render the live table on stdout.
    #[serde(default = "default_true")]
    pub terminal: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Node log file to follow for delay/socket/event series.
    #[serde(default = "default_log_path")]
    pub log_path: String,
    /// Default span served by /api/series/{name}.
    #[serde(default = "default_span_secs")]
    pub span_secs: u64,
    /// History kept per series; older points are dropped.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    #[serde(default = "default_delay_interval_ms")]
    pub delay_interval_ms: u64,
    #[serde(default = "default_socket_interval_ms")]
    pub socket_interval_ms: u64,
    /// Node whose confirmed counter feeds the throughput series.
    pub counter_node: Option<String>,
    #[serde(default = "default_counter_interval_ms")]
    pub counter_interval_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_path: default_log_path(),
            span_secs: default_span_secs(),
            retention_secs: default_retention_secs(),
            delay_interval_ms: default_delay_interval_ms(),
            socket_interval_ms: default_socket_interval_ms(),
            counter_node: None,
            counter_interval_ms: default_counter_interval_ms(),
        }
    }
}

fn default_log_path() -> String {
    "../0.log".into()
}

fn default_span_secs() -> u64 {
    60
}

fn default_retention_secs() -> u64 {
    600
}

fn default_delay_interval_ms() -> u64 {
    250
}

fn default_socket_interval_ms() -> u64 {
    10
}

fn default_counter_interval_ms() -> u64 {
    1000
}

impl LoggerConfig {
    /// Rows kept per store record.
    pub fn ring_capacity(&self) -> u32 {
        (self.duration_secs / self.interval_secs).min(u32::MAX as u64) as u32
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.logger.node_list.is_empty(),
            "logger.node_list must be non-empty"
        );
        anyhow::ensure!(
            self.logger.interval_secs > 0,
            "logger.interval_secs must be > 0, got {}",
            self.logger.interval_secs
        );
        anyhow::ensure!(
            self.logger.duration_secs >= self.logger.interval_secs,
            "logger.duration_secs must be >= logger.interval_secs, got {}",
            self.logger.duration_secs
        );
        anyhow::ensure!(
            !self.logger.reference_node.is_empty(),
            "logger.reference_node must be non-empty"
        );
        anyhow::ensure!(
            self.logger.experiment_timeout_secs > 0,
            "logger.experiment_timeout_secs must be > 0, got {}",
            self.logger.experiment_timeout_secs
        );
        anyhow::ensure!(
            self.logger.request_timeout_ms > 0,
            "logger.request_timeout_ms must be > 0, got {}",
            self.logger.request_timeout_ms
        );
        anyhow::ensure!(
            self.logger.report_channel_capacity > 0,
            "logger.report_channel_capacity must be > 0, got {}",
            self.logger.report_channel_capacity
        );
        anyhow::ensure!(!self.store.path.is_empty(), "store.path must be non-empty");
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        anyhow::ensure!(
            !self.dashboard.enabled || !self.dashboard.log_path.is_empty(),
            "dashboard.log_path must be non-empty"
        );
        anyhow::ensure!(
            self.dashboard.span_secs > 0,
            "dashboard.span_secs must be > 0, got {}",
            self.dashboard.span_secs
        );
        anyhow::ensure!(
            self.dashboard.retention_secs >= self.dashboard.span_secs
                && self.dashboard.retention_secs <= MAX_RETENTION_SECS,
            "dashboard.retention_secs must be in dashboard.span_secs..={}, got {}",
            MAX_RETENTION_SECS,
            self.dashboard.retention_secs
        );
        anyhow::ensure!(
            (1..=MAX_SERIES_INTERVAL_MS).contains(&self.dashboard.delay_interval_ms),
            "dashboard.delay_interval_ms must be in 1..={}, got {}",
            MAX_SERIES_INTERVAL_MS,
            self.dashboard.delay_interval_ms
        );
        anyhow::ensure!(
            (1..=1000).contains(&self.dashboard.socket_interval_ms),
            "dashboard.socket_interval_ms must be in 1..=1000, got {}",
            self.dashboard.socket_interval_ms
        );
        anyhow::ensure!(
            (1..=MAX_SERIES_INTERVAL_MS).contains(&self.dashboard.counter_interval_ms),
            "dashboard.counter_interval_ms must be in 1..={}, got {}",
            MAX_SERIES_INTERVAL_MS,
            self.dashboard.counter_interval_ms
        );
        Ok(())
    }
}
