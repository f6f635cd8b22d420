// Brain Configuration
//
// Store locations, kill-gate parameters and flush scheduling. Loaded from
// TOML; durations are written as whole seconds.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File name of the fast store inside a data directory
pub const FAST_STORE_FILE: &str = "brain_state.json";

/// File name of the archival database inside a data directory
pub const ARCHIVE_FILE: &str = "brain_history.db";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main brain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrainConfig {
    /// Single always-overwritten JSON record of the live state
    pub fast_store_path: PathBuf,

    /// SQLite database holding archived generations and their decisions
    pub archive_path: PathBuf,

    /// Archive the live state every N generations
    pub max_json_generations: u64,

    /// Scores below this mark a generation as failing
    pub performance_threshold: f64,

    /// Consecutive failing generations tolerated before the brain is killed
    pub zombie_grace_period: u32,

    /// Interval between background flushes of the fast store (in seconds)
    #[serde(with = "serde_duration")]
    pub auto_save_interval: Duration,

    /// Upper bound on how long stopping the flush scheduler may block (in seconds)
    #[serde(with = "serde_duration")]
    pub stop_timeout: Duration,

    /// Archival connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    4
}

// Custom serde module for Duration (serialize/deserialize as seconds)
mod serde_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Default data directory (XDG_DATA_HOME or platform equivalent)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("neurogen")
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self::in_dir(default_data_dir())
    }
}

impl BrainConfig {
    /// Default configuration with both stores placed under `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            fast_store_path: dir.join(FAST_STORE_FILE),
            archive_path: dir.join(ARCHIVE_FILE),
            max_json_generations: 100,
            performance_threshold: 0.5,
            zombie_grace_period: 5,
            auto_save_interval: Duration::from_secs(300), // 5 minutes
            stop_timeout: Duration::from_secs(5),
            pool_size: default_pool_size(),
        }
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: BrainConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_json_generations == 0 {
            return Err(ConfigError::ValidationError(
                "max_json_generations must be at least 1".to_string(),
            ));
        }

        if !self.performance_threshold.is_finite() {
            return Err(ConfigError::ValidationError(
                "performance_threshold must be a finite number".to_string(),
            ));
        }

        if self.zombie_grace_period == 0 {
            return Err(ConfigError::ValidationError(
                "zombie_grace_period must be at least 1".to_string(),
            ));
        }

        if self.auto_save_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "auto_save_interval must be greater than zero".to_string(),
            ));
        }

        if self.pool_size == 0 || self.pool_size > 64 {
            return Err(ConfigError::ValidationError(
                "pool_size must be between 1 and 64".to_string(),
            ));
        }

        if self.fast_store_path == self.archive_path {
            return Err(ConfigError::ValidationError(
                "fast_store_path and archive_path must differ".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }
}
