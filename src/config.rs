use serde::Deserialize;

use crate::series_store::{DEFAULT_HOST_CAPACITY, DEFAULT_WORKLOAD_CAPACITY};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub collector: CollectorSettings,
    #[serde(default)]
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_pool_size: u32,
    /// Records buffered by the history writer before a flush.
    pub flush_rate: u64,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

fn default_flush_interval_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorSettings {
    pub host_interval_ms: u64,
    pub workload_interval_ms: u64,
    /// How often the container listing is polled for added/removed workloads.
    pub listing_refresh_ms: u64,
    /// Upper bound on one sample fetch or listing call; must be below every interval.
    pub sample_timeout_ms: u64,
    /// Mount point whose usage is reported as host disk percent.
    #[serde(default = "default_disk_mount")]
    pub disk_mount: String,
    /// How often to log collector stats at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

fn default_disk_mount() -> String {
    "/".into()
}

fn default_stats_log_interval_secs() -> u64 {
    300
}

/// Ring buffer sizes; fixed once a series exists.
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_host_capacity")]
    pub host_capacity: usize,
    #[serde(default = "default_workload_capacity")]
    pub workload_capacity: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            host_capacity: DEFAULT_HOST_CAPACITY,
            workload_capacity: DEFAULT_WORKLOAD_CAPACITY,
        }
    }
}

fn default_host_capacity() -> usize {
    DEFAULT_HOST_CAPACITY
}

fn default_workload_capacity() -> usize {
    DEFAULT_WORKLOAD_CAPACITY
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
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );
        anyhow::ensure!(
            self.database.flush_rate > 0,
            "database.flush_rate must be > 0, got {}",
            self.database.flush_rate
        );
        anyhow::ensure!(
            self.database.flush_interval_secs > 0,
            "database.flush_interval_secs must be > 0, got {}",
            self.database.flush_interval_secs
        );
        let c = &self.collector;
        anyhow::ensure!(
            c.host_interval_ms > 0,
            "collector.host_interval_ms must be > 0, got {}",
            c.host_interval_ms
        );
        anyhow::ensure!(
            c.workload_interval_ms > 0,
            "collector.workload_interval_ms must be > 0, got {}",
            c.workload_interval_ms
        );
        anyhow::ensure!(
            c.listing_refresh_ms > 0,
            "collector.listing_refresh_ms must be > 0, got {}",
            c.listing_refresh_ms
        );
        anyhow::ensure!(
            c.sample_timeout_ms > 0,
            "collector.sample_timeout_ms must be > 0, got {}",
            c.sample_timeout_ms
        );
        anyhow::ensure!(
            c.sample_timeout_ms < c.host_interval_ms.min(c.workload_interval_ms),
            "collector.sample_timeout_ms ({}) must be shorter than both collector intervals",
            c.sample_timeout_ms
        );
        anyhow::ensure!(
            c.sample_timeout_ms < c.listing_refresh_ms,
            "collector.sample_timeout_ms ({}) must be shorter than collector.listing_refresh_ms ({})",
            c.sample_timeout_ms,
            c.listing_refresh_ms
        );
        anyhow::ensure!(
            !c.disk_mount.is_empty(),
            "collector.disk_mount must be non-empty"
        );
        anyhow::ensure!(
            c.stats_log_interval_secs > 0,
            "collector.stats_log_interval_secs must be > 0, got {}",
            c.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.retention.host_capacity > 0,
            "retention.host_capacity must be > 0, got {}",
            self.retention.host_capacity
        );
        anyhow::ensure!(
            self.retention.workload_capacity > 0,
            "retention.workload_capacity must be > 0, got {}",
            self.retention.workload_capacity
        );
        Ok(())
    }
}
