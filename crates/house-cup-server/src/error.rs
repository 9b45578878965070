//! Error types for the leaderboard server binary.
//!
//! [`AppError`] is the top-level error type that wraps every failure mode
//! during startup and shutdown.

/// Top-level error for the server binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: house_cup_core::ConfigError,
    },

    /// The event store could not be opened.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: house_cup_db::StoreError,
    },

    /// The HTTP server failed to start.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying startup error.
        #[from]
        source: house_cup_observer::StartupError,
    },

    /// Logging could not be initialized.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the failure.
        message: String,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
