//! Domain types, key namespace, and content codec for reqbot.

/// Content encoding for stored blobs.
pub mod codec;
/// Header and query-parameter mappings.
pub mod fields;
/// Identifier types.
pub mod id;
/// Storage key layout.
pub mod keys;
/// Captured requests.
pub mod request;
/// Pre-programmed responses.
pub mod response;

pub use codec::CodecError;
pub use fields::FieldMap;
pub use id::{RequestId, ResponseId};
pub use request::{CapturedRequest, CapturedRequestBuilder};
pub use response::{StoredResponse, StoredResponseBuilder};
