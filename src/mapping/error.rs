//! Error types of the mapping module

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MappingError {
    /// Invalid engine or layout configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitializationError(String),

    /// Input or output channel closed or full
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Engine task panicked or was cancelled
    #[error("Thread error: {0}")]
    ThreadError(String),
}
