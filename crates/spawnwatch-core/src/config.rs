//! Configuration loading and typed config structures for the spawnwatch client.
//!
//! The configuration lives in `spawnwatch-config.yaml`. Every section and
//! field has a default, so an empty file (or none at all) yields a working
//! client pointed at a local map server.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::scheduler::SchedulerConfig;

/// Environment variable overriding `server.base_url`.
pub const ENV_SERVER_URL: &str = "SPAWNWATCH_SERVER_URL";
/// Environment variable overriding `polling.feed_interval_ms`.
pub const ENV_FEED_INTERVAL_MS: &str = "SPAWNWATCH_FEED_INTERVAL_MS";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The values parsed but cannot be used.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level client configuration, mirroring `spawnwatch-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Map server location and fetch limits.
    #[serde(default)]
    pub server: ServerConfig,

    /// Timer intervals.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Label rendering.
    #[serde(default)]
    pub display: DisplayConfig,

    /// Where user preferences are read from.
    #[serde(default)]
    pub preferences: PreferencesConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides:
    ///
    /// - `SPAWNWATCH_SERVER_URL` overrides `server.base_url`
    /// - `SPAWNWATCH_FEED_INTERVAL_MS` overrides `polling.feed_interval_ms`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides
    /// are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Override settings with environment variables when set.
    ///
    /// An unparseable interval is logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(ENV_SERVER_URL) {
            self.server.base_url = val;
        }
        if let Ok(val) = std::env::var(ENV_FEED_INTERVAL_MS) {
            match val.trim().parse::<u64>() {
                Ok(ms) => self.polling.feed_interval_ms = ms,
                Err(e) => warn!(
                    var = ENV_FEED_INTERVAL_MS,
                    value = %val,
                    error = %e,
                    "ignoring invalid feed interval override"
                ),
            }
        }
    }

    /// Check that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("polling.feed_interval_ms", self.polling.feed_interval_ms),
            ("polling.countdown_interval_ms", self.polling.countdown_interval_ms),
            ("server.fetch_timeout_ms", self.server.fetch_timeout_ms),
            ("preferences.reload_interval_ms", self.preferences.reload_interval_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::Invalid {
                reason: format!("{name} must be greater than zero"),
            });
        }
        if self.server.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "server.base_url must not be empty".to_owned(),
            });
        }
        Ok(())
    }

    /// Timer settings for the poll scheduler.
    pub const fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            feed_interval: Duration::from_millis(self.polling.feed_interval_ms),
            countdown_interval: Duration::from_millis(self.polling.countdown_interval_ms),
            fetch_timeout: Duration::from_millis(self.server.fetch_timeout_ms),
        }
    }
}

/// Map server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the map server.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the snapshot endpoint, relative to `base_url`.
    #[serde(default = "default_data_path")]
    pub data_path: String,

    /// Fetches slower than this count as failed.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

impl ServerConfig {
    /// Full URL of the snapshot endpoint.
    pub fn data_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.data_path.trim_start_matches('/')
        )
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            data_path: default_data_path(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

/// Timer intervals.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PollingConfig {
    /// Interval between snapshot fetches.
    #[serde(default = "default_feed_interval_ms")]
    pub feed_interval_ms: u64,

    /// Interval between countdown label refreshes.
    #[serde(default = "default_countdown_interval_ms")]
    pub countdown_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            feed_interval_ms: default_feed_interval_ms(),
            countdown_interval_ms: default_countdown_interval_ms(),
        }
    }
}

/// Label rendering settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DisplayConfig {
    /// Directory holding template overrides. Built-in templates are used
    /// when unset or for any file it lacks.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
}

/// Where preferences come from and how often they are re-read.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PreferencesConfig {
    /// JSON preferences file.
    #[serde(default = "default_preferences_path")]
    pub path: PathBuf,

    /// How often the file is checked for changes.
    #[serde(default = "default_reload_interval_ms")]
    pub reload_interval_ms: u64,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            path: default_preferences_path(),
            reload_interval_ms: default_reload_interval_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_owned()
}

fn default_data_path() -> String {
    "/map-data".to_owned()
}

const fn default_fetch_timeout_ms() -> u64 {
    4000
}

const fn default_feed_interval_ms() -> u64 {
    5000
}

const fn default_countdown_interval_ms() -> u64 {
    1000
}

fn default_preferences_path() -> PathBuf {
    PathBuf::from("spawnwatch-preferences.json")
}

const fn default_reload_interval_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_map_client() {
        let config = ClientConfig::default();
        assert_eq!(config.server.data_url(), "http://127.0.0.1:5000/map-data");
        assert_eq!(config.polling.feed_interval_ms, 5000);
        assert_eq!(config.polling.countdown_interval_ms, 1000);
        assert_eq!(config.server.fetch_timeout_ms, 4000);
        assert_eq!(config.logging.level, "info");
        assert!(config.display.templates_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
server:
  base_url: "http://scanner.local:8080/"
  data_path: "raw_data"
  fetch_timeout_ms: 2500
polling:
  feed_interval_ms: 10000
  countdown_interval_ms: 500
display:
  templates_dir: "/etc/spawnwatch/templates"
preferences:
  path: "/var/lib/spawnwatch/prefs.json"
  reload_interval_ms: 1000
logging:
  level: "debug"
"#;
        let config = ClientConfig::parse(yaml).unwrap();

        assert_eq!(config.server.data_url(), "http://scanner.local:8080/raw_data");
        assert_eq!(config.preferences.path, PathBuf::from("/var/lib/spawnwatch/prefs.json"));
        assert_eq!(
            config.display.templates_dir,
            Some(PathBuf::from("/etc/spawnwatch/templates"))
        );
        assert_eq!(config.logging.level, "debug");

        let timers = config.scheduler_config();
        assert_eq!(timers.feed_interval, Duration::from_millis(10_000));
        assert_eq!(timers.countdown_interval, Duration::from_millis(500));
        assert_eq!(timers.fetch_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = ClientConfig::parse("polling:\n  feed_interval_ms: 3000\n").unwrap();
        assert_eq!(config.polling.feed_interval_ms, 3000);
        assert_eq!(config.polling.countdown_interval_ms, 1000);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn parse_empty_yaml() {
        assert_eq!(ClientConfig::parse("{}").unwrap(), ClientConfig::default());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = ClientConfig::parse("polling:\n  countdown_interval_ms: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref reason } if reason.contains("countdown")));
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(matches!(
            ClientConfig::parse("server: [unclosed"),
            Err(ConfigError::Yaml { .. })
        ));
    }
}
