use thiserror::Error;

/// Error enum shared by the service binaries
#[derive(Error, Debug)]
pub enum RelayError {
    /// gRPC transport errors
    #[error("gRPC error: {0}")]
    GrpcError(String),

    /// Listener binding and socket errors
    #[error("Network error: {0}")]
    NetworkError(String),

    /// HTTP health surface errors
    #[error("Server error: {0}")]
    ServerError(String),

    /// Broker connection, publish and consume errors that ended a role
    #[error("Event bus error: {0}")]
    EventBusError(String),

    /// Background task failures (panics, aborted joins)
    #[error("Task error: {0}")]
    TaskError(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Log an error with the context it was raised in
pub fn log_error(context: &str, error: &RelayError) {
    tracing::error!(
        context = context,
        error = %error,
        "Relay error occurred"
    );
}
