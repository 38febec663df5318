//! Error types for the CLI client.

use thiserror::Error;

/// Errors that can occur when talking to the server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server address could not be parsed.
    #[error("invalid server address: {0}")]
    InvalidUrl(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server rejected the request.
    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Reading an input file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
