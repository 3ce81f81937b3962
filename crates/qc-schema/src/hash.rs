//! Content fingerprints for payloads.

use sha2::{Digest, Sha256};

use crate::schema::Payload;

/// SHA-256 of the payload's JSON encoding, hex encoded.
pub fn payload_fingerprint(payload: &Payload) -> String {
    let mut hasher = Sha256::new();
    let json = serde_json::to_string(payload).unwrap_or_default();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}
