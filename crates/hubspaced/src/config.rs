//! Configuration file parsing and structures.
//!
//! hubspaced is configured from a single TOML file holding the Hubspace
//! account, the devices to expose, logging and the HTTP API.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Top-level configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    pub hubspace: HubspaceConfig,

    #[serde(default)]
    pub api: ApiConfig,

    pub fixture: Option<FixtureConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `hubspaced::poller = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Filter directives: the global level plus one `target=level` per
    /// override.
    pub fn directives(&self) -> String {
        let mut overrides: Vec<_> = self.overrides.iter().collect();
        overrides.sort();

        std::iter::once(LevelFilter::from(self.level).to_string())
            .chain(
                overrides
                    .into_iter()
                    .map(|(target, level)| format!("{}={}", target, LevelFilter::from(*level))),
            )
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::new(self.directives())
    }
}

/// Hubspace account and device selection
#[derive(Debug, Clone, Deserialize)]
pub struct HubspaceConfig {
    pub username: String,
    pub password: String,

    /// Collect raw vendor state on every refresh
    #[serde(default)]
    pub debug: bool,

    /// Devices to expose, by their friendly name in the Hubspace app
    #[serde(default)]
    pub friendly_names: Vec<String>,

    /// Rooms whose devices should all be exposed
    #[serde(default)]
    pub room_names: Vec<String>,

    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
}

fn default_scan_interval() -> u64 {
    60
}

impl HubspaceConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8565
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
        }
    }
}

/// In-memory vendor backing the daemon
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureConfig {
    /// Device file; relative paths resolve against the config file
    pub path: PathBuf,
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        let mut config = Self::from_toml(&contents)?;
        if let (Some(fixture), Some(dir)) = (config.fixture.as_mut(), path.parent()) {
            if fixture.path.is_relative() {
                fixture.path = dir.join(&fixture.path);
            }
        }
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.hubspace.username.trim().is_empty() {
            return Err(ConfigError::Validation("hubspace.username is empty".to_string()));
        }
        if self.hubspace.password.is_empty() {
            return Err(ConfigError::Validation("hubspace.password is empty".to_string()));
        }
        if self.hubspace.scan_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "hubspace.scan_interval_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}
