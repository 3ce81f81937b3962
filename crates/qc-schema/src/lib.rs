//! qc-schema: payload format, outbound request format, and validation.

pub mod hash;
pub mod request;
pub mod schema;
pub mod validate;
mod wire;

pub use hash::payload_fingerprint;
pub use request::{RequestKind, RequestPayload, RequestSample};
pub use schema::*;
pub use validate::{ValidationError, validate_payload};

pub type SchemaResult<T> = Result<T, SchemaError>;

#[derive(thiserror::Error, Debug)]
pub enum SchemaError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn from_json_str(content: &str) -> SchemaResult<Payload> {
    let payload: Payload = serde_json::from_str(content)?;
    validate_payload(&payload)?;
    Ok(payload)
}

pub fn load_json(path: &std::path::Path) -> SchemaResult<Payload> {
    let content = std::fs::read_to_string(path)?;
    from_json_str(&content)
}

pub fn save_json(path: &std::path::Path, payload: &Payload) -> SchemaResult<()> {
    validate_payload(payload)?;
    let content = serde_json::to_string_pretty(payload)?;
    std::fs::write(path, content)?;
    Ok(())
}
