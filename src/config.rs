//! TOML configuration.

use std::path::Path;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path or URL.
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "json" for machine-readable output, anything else logs pretty.
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Background sweep of expired wagers.
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_max_connections() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

fn default_sweep_interval() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "database.url",
            }
            .into());
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "database.max_connections",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        if self.sweeper.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sweeper.interval_secs",
                reason: "must be at least 1 second".into(),
            }
            .into());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "tote.db".into(),
                max_connections: default_max_connections(),
            },
            logging: LoggingConfig::default(),
            sweeper: SweeperConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval(),
            enabled: true,
        }
    }
}

impl LoggingConfig {
    /// Install the global tracing subscriber. `RUST_LOG` overrides the
    /// configured level when set.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        if self.format == "json" {
            builder.json().init();
        } else {
            builder.pretty().init();
        }
    }
}
