//! Runtime error types.

use thiserror::Error;

use sprocket_transport::TransportError;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Loading or validating configuration failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The webhook server could not be started.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Waiting for a shutdown signal failed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
