//! Error types for the qc-app service layer.

use std::path::PathBuf;

use crate::config::Endpoint;

/// Classified transport failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("Unauthorized (HTTP 401)")]
    Unauthorized,

    #[error("Forbidden (HTTP 403)")]
    Forbidden,

    #[error("Not found (HTTP 404)")]
    NotFound,

    #[error("Server error (HTTP {status})")]
    Server { status: u16 },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Request rejected by server: {message}")]
    Rejected { message: String },
}

impl TransportError {
    /// Map a non-success HTTP status. Success statuses yield `None`.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            401 => Some(TransportError::Unauthorized),
            403 => Some(TransportError::Forbidden),
            404 => Some(TransportError::NotFound),
            status => Some(TransportError::Server { status }),
        }
    }

    /// Only network-level failures are worth retrying; HTTP error
    /// responses are final.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Timeout | TransportError::Network(_))
    }
}

/// Application error type shared by the CLI and any other front end.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Payload error: {0}")]
    Payload(String),

    #[error("Payload validation failed: {0}")]
    Validation(String),

    #[error("No dataset loaded")]
    NoDataset,

    #[error("No {which} endpoint configured")]
    NoEndpoint { which: Endpoint },

    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for qc-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<qc_schema::SchemaError> for AppError {
    fn from(err: qc_schema::SchemaError) -> Self {
        match err {
            qc_schema::SchemaError::Validation(v) => AppError::Validation(v.to_string()),
            other => AppError::Payload(other.to_string()),
        }
    }
}

impl From<qc_schema::ValidationError> for AppError {
    fn from(err: qc_schema::ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<qc_store::StoreError> for AppError {
    fn from(err: qc_store::StoreError) -> Self {
        match err {
            qc_store::StoreError::NoDataset => AppError::NoDataset,
            other => AppError::InvalidInput(other.to_string()),
        }
    }
}
