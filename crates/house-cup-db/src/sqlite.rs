//! `SQLite` connection pool and configuration.
//!
//! `SQLite` is the local append-only log backing the event store. The
//! database runs in WAL mode so readers never block the single writer.
//!
//! Uses [`sqlx`] with runtime query construction (not compile-time checked)
//! to avoid requiring a live database at build time. All queries are
//! parameterized to prevent SQL injection.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::error::StoreError;

/// Default maximum number of connections in the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default connection timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default idle timeout in seconds.
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Configuration for the `SQLite` connection pool.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// `SQLite` connection URL.
    ///
    /// Format: `sqlite://path/to/file.db`
    pub url: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
}

impl SqliteConfig {
    /// Create a new configuration from a database URL.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_owned(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }

    /// Create a configuration for a database file on disk.
    pub fn for_path(path: &std::path::Path) -> Self {
        Self::new(&format!("sqlite://{}", path.display()))
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Connection pool handle to `SQLite`.
///
/// Wraps a [`sqlx::SqlitePool`]. Cloning is cheap and shares the pool.
#[derive(Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Connect to `SQLite` using the provided configuration, creating the
    /// database file if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the connection fails.
    /// Returns [`StoreError::Config`] if the URL cannot be parsed.
    pub async fn connect(config: &SqliteConfig) -> Result<Self, StoreError> {
        let connect_options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| StoreError::Config(format!("Invalid database URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .connect_with(connect_options)
            .await?;

        tracing::info!(
            url = %config.url,
            max_connections = config.max_connections,
            "Connected to SQLite"
        );

        Ok(Self { pool })
    }

    /// Connect and make sure the schema exists before first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the connection or a migration fails.
    pub async fn open(config: &SqliteConfig) -> Result<Self, StoreError> {
        let db = Self::connect(config).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending migrations from the `migrations/` directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Migration`] if any migration fails.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// Return a reference to the underlying [`SqlitePool`].
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all connections in the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("SQLite pool closed");
    }
}
