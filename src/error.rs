//! Error types for streaming and the backend client

use reqwest::StatusCode;
use thiserror::Error;

/// Terminal failure of a single streamed response
#[derive(Error, Debug)]
pub enum StreamError {
    /// The server sent an `{"error": ...}` payload
    #[error("{0}")]
    Fatal(String),

    /// The underlying transport rejected a read
    #[error("Stream read failed: {0}")]
    Read(String),

    #[error("Stream cancelled")]
    Cancelled,
}

/// A single malformed `data:` line. Logged and skipped, never fatal.
#[derive(Error, Debug)]
#[error("Malformed stream payload `{payload}`: {source}")]
pub struct TransientParseError {
    pub payload: String,
    #[source]
    pub source: serde_json::Error,
}

/// The completed buffer did not contain valid fenced JSON
#[derive(Error, Debug)]
#[error("Failed to decode generated JSON: {source}")]
pub struct FinalDecodeError {
    pub payload: String,
    #[source]
    pub source: serde_json::Error,
}

/// Backend client error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication failed ({0}), please set a new token")]
    Auth(StatusCode),

    #[error("Request failed with status {status}: {detail}")]
    Status { status: StatusCode, detail: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Decode(#[from] FinalDecodeError),
}

impl ApiError {
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, ApiError>;
