//! Base64 transport encoding for file bodies.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine as _;

use crate::ContentStoreError;

/// Encode a body for transport (standard alphabet, padded).
pub fn encode(body: &str) -> String {
    STANDARD.encode(body.as_bytes())
}

/// Decode a transported body.
///
/// Line breaks inserted by the server are ignored and unpadded input is
/// accepted.
pub fn decode(encoded: &str) -> Result<String, ContentStoreError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(&compact)
        .or_else(|_| STANDARD_NO_PAD.decode(&compact))
        .map_err(|e| ContentStoreError::Decode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ContentStoreError::Decode(e.to_string()))
}
