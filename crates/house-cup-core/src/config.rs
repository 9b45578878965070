//! Configuration loading and typed config structures for the House Cup
//! leaderboard service.
//!
//! The canonical configuration lives in `house-cup-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure, and provides a loader that reads and validates the file.
//! Every field has a default, so an empty file (or none at all) yields a
//! runnable configuration.

use std::path::Path;

use serde::Deserialize;

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

    /// A value parsed but is not usable.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level service configuration.
///
/// Mirrors the structure of `house-cup-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HouseCupConfig {
    /// HTTP / WebSocket listener settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Event store settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Default event producer and worker settings.
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Live-feed fan-out settings.
    #[serde(default)]
    pub broadcast: BroadcastConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HouseCupConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `DATABASE_URL` overrides `database.url`
    /// - `HOUSE_CUP_PORT` overrides `server.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an override is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Override values with environment variables when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `HOUSE_CUP_PORT` is not a port.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("HOUSE_CUP_PORT") {
            self.server.port = val.parse().map_err(|e| ConfigError::Invalid {
                field: "server.port",
                reason: format!("HOUSE_CUP_PORT={val:?}: {e}"),
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ingestion.min_points > self.ingestion.max_points {
            return Err(ConfigError::Invalid {
                field: "ingestion.min_points",
                reason: format!(
                    "{} is greater than max_points {}",
                    self.ingestion.min_points, self.ingestion.max_points
                ),
            });
        }
        if self.broadcast.subscriber_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "broadcast.subscriber_buffer",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid {
                field: "database.max_connections",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// HTTP / WebSocket listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSettings {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Which [`EventStore`](house_cup_db::EventStore) backs the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Durable `SQLite` file.
    #[default]
    Sqlite,
    /// Volatile in-process map.
    Memory,
}

/// Event store settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    /// Storage engine.
    #[serde(default)]
    pub backend: StoreBackend,

    /// `SQLite` connection URL (ignored for the memory backend).
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Milliseconds to wait for a pooled connection.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_database_url(),
            max_connections: default_max_connections(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Settings for the built-in random event producer and the worker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IngestionConfig {
    /// Milliseconds between generated events.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Stop producing after this many events (0 = unlimited).
    #[serde(default)]
    pub max_events: u64,

    /// Smallest point delta generated (may be negative).
    #[serde(default = "default_min_points")]
    pub min_points: i64,

    /// Largest point delta generated.
    #[serde(default = "default_max_points")]
    pub max_points: i64,

    /// Backdate generated timestamps by up to this many seconds, so the
    /// stream arrives out of timestamp order.
    #[serde(default)]
    pub max_backdate_secs: u64,

    /// Start ingesting as soon as the server is up.
    #[serde(default)]
    pub autostart: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_events: 0,
            min_points: default_min_points(),
            max_points: default_max_points(),
            max_backdate_secs: 0,
            autostart: false,
        }
    }
}

/// Live-feed fan-out settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BroadcastConfig {
    /// Messages buffered per subscriber before new ones are dropped.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    5001
}

fn default_database_url() -> String {
    "sqlite://house_points.db".to_owned()
}

const fn default_max_connections() -> u32 {
    5
}

const fn default_connect_timeout_ms() -> u64 {
    5000
}

const fn default_interval_ms() -> u64 {
    1000
}

const fn default_min_points() -> i64 {
    -5
}

const fn default_max_points() -> i64 {
    20
}

const fn default_subscriber_buffer() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = HouseCupConfig::default();
        assert_eq!(config.server.port, 5001);
        assert_eq!(config.database.backend, StoreBackend::Sqlite);
        assert_eq!(config.ingestion.interval_ms, 1000);
        assert!(!config.ingestion.autostart);
        assert_eq!(config.broadcast.subscriber_buffer, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9090

database:
  backend: memory
  url: "sqlite://test.db"
  max_connections: 2
  connect_timeout_ms: 250

ingestion:
  interval_ms: 50
  max_events: 10
  min_points: -1
  max_points: 3
  max_backdate_secs: 600
  autostart: true

broadcast:
  subscriber_buffer: 8

logging:
  level: "debug"
  format: json
"#;

        let config = HouseCupConfig::parse(yaml);
        assert!(config.is_ok(), "{config:?}");
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.ingestion.max_events, 10);
        assert_eq!(config.ingestion.min_points, -1);
        assert_eq!(config.ingestion.max_backdate_secs, 600);
        assert!(config.ingestion.autostart);
        assert_eq!(config.broadcast.subscriber_buffer, 8);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "server:\n  port: 7000\n";
        let config = HouseCupConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        // Port is overridden
        assert_eq!(config.server.port, 7000);
        // Everything else uses defaults
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.url, "sqlite://house_points.db");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parse_empty_yaml() {
        let config = HouseCupConfig::parse("");
        assert!(config.is_ok());
        assert_eq!(config.ok(), Some(HouseCupConfig::default()));
    }

    #[test]
    fn inverted_point_range_is_rejected() {
        let yaml = "ingestion:\n  min_points: 10\n  max_points: 1\n";
        let config = HouseCupConfig::parse(yaml);
        assert!(matches!(
            config,
            Err(ConfigError::Invalid {
                field: "ingestion.min_points",
                ..
            })
        ));
    }

    #[test]
    fn zero_subscriber_buffer_is_rejected() {
        let yaml = "broadcast:\n  subscriber_buffer: 0\n";
        assert!(HouseCupConfig::parse(yaml).is_err());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("house-cup-config.yaml");
        if path.exists() {
            let config = HouseCupConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
