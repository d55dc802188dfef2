//! Error types for the spawnwatch client binary.
//!
//! [`ClientError`] wraps every failure that can stop the client during
//! startup. Once the poll loop is running, fetch failures are reported on
//! the status indicator instead of surfacing here.

/// Top-level error for the client binary.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: spawnwatch_core::config::ConfigError,
    },

    /// Label templates failed to load.
    #[error("label error: {source}")]
    Label {
        /// The underlying template error.
        #[from]
        source: spawnwatch_core::label::LabelError,
    },

    /// The HTTP client could not be built.
    #[error("HTTP client error: {message}")]
    Http {
        /// Description of the failure.
        message: String,
    },
}
