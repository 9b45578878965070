//! Service wiring for the server binary.
//!
//! Turns a [`HouseCupConfig`] into the running object graph: event store,
//! aggregator, broadcast hub, producer, and ingestion controller, bundled
//! as the observer's [`AppState`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use house_cup_core::config::StoreBackend;
use house_cup_core::{
    Aggregator, BroadcastHub, EventProducer, HouseCupConfig, IngestionController, RandomProducer,
};
use house_cup_db::{EventStore, MemoryEventStore, SqliteConfig, SqliteDb, SqliteEventStore};
use house_cup_observer::AppState;
use tracing::info;

use crate::error::AppError;

/// Default config file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "house-cup-config.yaml";

/// Environment variable naming an alternative config file.
const CONFIG_PATH_ENV: &str = "HOUSE_CUP_CONFIG";

/// Where to look for the config file.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load the configuration from `path`, or defaults if it does not exist.
///
/// Environment overrides apply either way.
pub fn load_config(path: &Path) -> Result<HouseCupConfig, AppError> {
    if path.exists() {
        Ok(HouseCupConfig::from_file(path)?)
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
        Ok(HouseCupConfig::from_env()?)
    }
}

/// Open the configured event store, creating and migrating it if needed.
pub async fn open_store(config: &HouseCupConfig) -> Result<Arc<dyn EventStore>, AppError> {
    match config.database.backend {
        StoreBackend::Sqlite => {
            let db_config = SqliteConfig::new(&config.database.url)
                .with_max_connections(config.database.max_connections)
                .with_connect_timeout(Duration::from_millis(config.database.connect_timeout_ms));
            let db = SqliteDb::open(&db_config).await?;
            let store = SqliteEventStore::new(&db);
            info!(
                url = %config.database.url,
                events = store.count().await?,
                "SQLite event store ready"
            );
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            info!("In-memory event store ready (events are not persisted)");
            Ok(Arc::new(MemoryEventStore::new()))
        }
    }
}

/// Assemble the application state around `store` and `producer`.
pub fn build_state(
    config: &HouseCupConfig,
    store: Arc<dyn EventStore>,
    producer: Arc<dyn EventProducer>,
) -> Arc<AppState> {
    let hub = Arc::new(BroadcastHub::new(Aggregator::new(Arc::clone(&store))));
    let controller = IngestionController::new(store, Arc::clone(&hub), producer);
    Arc::new(
        AppState::new(hub, controller).with_subscriber_buffer(config.broadcast.subscriber_buffer),
    )
}

/// The producer the binary ingests from.
pub fn default_producer(config: &HouseCupConfig) -> Arc<dyn EventProducer> {
    Arc::new(RandomProducer::from_config(&config.ingestion))
}
