//! Event codec
//!
//! Events travel as a JSON object with two string fields:
//!
//! ```json
//! {"operation": "CREATE", "email": "ann@x.com"}
//! ```
//!
//! Decoding ignores unknown fields and does not check that `operation` is a
//! known code; only the shape is enforced here.

use crate::error::CodecError;
use crate::models::UserEvent;
use serde_json::json;

/// Encode an event to its wire bytes.
pub fn encode(event: &UserEvent) -> Vec<u8> {
    json!({
        "operation": event.operation,
        "email": event.email,
    })
    .to_string()
    .into_bytes()
}

/// Decode wire bytes into an event.
///
/// Fails with [`CodecError::Malformed`] when the bytes are not a JSON object,
/// or when `operation` or `email` is missing or not a string.
pub fn decode(bytes: &[u8]) -> Result<UserEvent, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::Malformed("empty payload".to_string()));
    }

    Ok(serde_json::from_slice(bytes)?)
}
