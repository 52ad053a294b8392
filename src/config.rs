use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Agency this core process runs for. Must be non-empty.
    pub agency_id: String,
    pub database: DatabaseConfig,
    /// Address the service endpoints listen on (default: 0.0.0.0:3000)
    #[serde(default = "Config::default_bind_addr")]
    pub bind_addr: String,
    /// Explicitly allow all origins (development only). Defaults to false.
    #[serde(default)]
    pub cors_permissive: bool,
    #[serde(default)]
    pub data_log: DataLogConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub timeout: TimeoutConfig,
    /// Optional background modules started once the core is live.
    #[serde(default)]
    pub optional_modules: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Configuration for the asynchronous data log queue
#[derive(Debug, Clone, Deserialize)]
pub struct DataLogConfig {
    /// Whether generated records are durably written at all. Disabled in
    /// playback mode since the history being replayed was already logged.
    #[serde(default = "DataLogConfig::default_enabled")]
    pub enabled: bool,
    /// Queue capacity in records (default: 5000)
    #[serde(default = "DataLogConfig::default_capacity")]
    pub capacity: usize,
    /// When the queue is full, block the producer instead of rejecting
    /// the record (default: true)
    #[serde(default = "DataLogConfig::default_pause_if_filling")]
    pub pause_if_filling: bool,
}

impl Default for DataLogConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            capacity: Self::default_capacity(),
            pause_if_filling: Self::default_pause_if_filling(),
        }
    }
}

impl DataLogConfig {
    fn default_enabled() -> bool {
        true
    }
    fn default_capacity() -> usize {
        5000
    }
    fn default_pause_if_filling() -> bool {
        true
    }
}

/// Configuration for historical cache population at startup
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// How many days back to load into the historical caches (default: 3)
    #[serde(default = "HistoryConfig::default_window_days")]
    pub window_days: u32,
    /// How many days each population query covers. Smaller chunks bound
    /// peak memory during startup (default: 1)
    #[serde(default = "HistoryConfig::default_chunk_days")]
    pub chunk_days: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window_days: Self::default_window_days(),
            chunk_days: Self::default_chunk_days(),
        }
    }
}

impl HistoryConfig {
    fn default_window_days() -> u32 {
        3
    }
    fn default_chunk_days() -> u32 {
        1
    }
}

/// Configuration for the vehicle staleness monitor
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    /// Seconds between staleness scans (default: 30)
    #[serde(default = "TimeoutConfig::default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// A vehicle with no report for this long is considered stale
    /// (default: 360)
    #[serde(default = "TimeoutConfig::default_stale_after_secs")]
    pub stale_after_secs: i64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: Self::default_check_interval_secs(),
            stale_after_secs: Self::default_stale_after_secs(),
        }
    }
}

impl TimeoutConfig {
    fn default_check_interval_secs() -> u64 {
        30
    }
    fn default_stale_after_secs() -> i64 {
        360
    }
}

impl Config {
    fn default_bind_addr() -> String {
        "0.0.0.0:3000".to_string()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agency_id.trim().is_empty() {
            return Err(ConfigError::MissingAgencyId);
        }
        if self.history.chunk_days == 0 {
            return Err(ConfigError::Invalid(
                "history.chunk_days must be at least 1".to_string(),
            ));
        }
        if self.data_log.capacity == 0 {
            return Err(ConfigError::Invalid(
                "data_log.capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("agency_id must be set to a non-empty value")]
    MissingAgencyId,
    #[error("Invalid config: {0}")]
    Invalid(String),
}
