//! Error types for the Ellipsis client.

/// Top-level error type for the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request could not be sent or completed.
    #[error("request error: {0}")]
    Request(String),

    /// Backend responded with a non-success status.
    #[error("backend error: {0}")]
    Api(String),

    /// Progress stream (SSE) error.
    #[error("stream error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Persisted client-state storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Platform connect flow error (login window, OAuth URL).
    #[error("connect error: {0}")]
    Connect(String),

    /// Episode publishing error.
    #[error("publish error: {0}")]
    Publish(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ClientError>;
