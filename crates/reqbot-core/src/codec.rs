//! JSON encoding of content blobs.
//!
//! Optional values are always written as explicit `null` and every field must
//! be present when decoding, so a truncated blob fails loudly instead of
//! decoding into a half-empty record.

use crate::request::CapturedRequest;
use crate::response::StoredResponse;
use thiserror::Error;

/// Failure to convert between a content type and its stored representation.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value could not be serialized.
    #[error("Failed to encode {kind}: {source}")]
    Encode {
        /// Content kind being encoded.
        kind: &'static str,
        /// Underlying serializer error.
        #[source]
        source: serde_json::Error,
    },

    /// A stored value does not have the expected shape.
    #[error("Failed to decode {kind}: {source}")]
    Decode {
        /// Content kind being decoded.
        kind: &'static str,
        /// Underlying parser error.
        #[source]
        source: serde_json::Error,
    },
}

const REQUEST: &str = "request";
const RESPONSE: &str = "response";

/// Encode a captured request.
///
/// # Errors
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode_request(request: &CapturedRequest) -> Result<String, CodecError> {
    serde_json::to_string(request).map_err(|source| CodecError::Encode { kind: REQUEST, source })
}

/// Decode a captured request.
///
/// # Errors
/// Returns [`CodecError::Decode`] if `raw` is not a complete request record.
pub fn decode_request(raw: &str) -> Result<CapturedRequest, CodecError> {
    serde_json::from_str(raw).map_err(|source| CodecError::Decode { kind: REQUEST, source })
}

/// Encode a stored response.
///
/// # Errors
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode_response(response: &StoredResponse) -> Result<String, CodecError> {
    serde_json::to_string(response).map_err(|source| CodecError::Encode { kind: RESPONSE, source })
}

/// Decode a stored response.
///
/// # Errors
/// Returns [`CodecError::Decode`] if `raw` is not a complete response record.
pub fn decode_response(raw: &str) -> Result<StoredResponse, CodecError> {
    serde_json::from_str(raw).map_err(|source| CodecError::Decode { kind: RESPONSE, source })
}
