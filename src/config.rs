use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATABASE: &str = "ledgerbank.db";
pub const DEFAULT_LOG_FILTER: &str = "info";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 10;

/// Runtime settings for the store and the logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite database file
    pub database: PathBuf,
    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub log_filter: String,
    /// Connection pool size; bounds how many transfers run at once
    pub max_connections: u32,
    /// How long a writer waits for another writer's lock before failing
    pub busy_timeout: Duration,
}

impl Config {
    pub fn new(database: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn with_log_filter(mut self, log_filter: impl Into<String>) -> Self {
        self.log_filter = log_filter.into();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: Duration::from_secs(DEFAULT_BUSY_TIMEOUT_SECS),
        }
    }
}
