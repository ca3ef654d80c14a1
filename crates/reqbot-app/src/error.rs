//! Error types surfaced by the stores and the service façade.

use reqbot_core::CodecError;
use reqbot_store::BackendError;
use thiserror::Error;

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, RepoError>;

/// Errors returned by [`crate::CappedBucketStore`], [`crate::TagIndexedStore`]
/// and [`crate::ReqbotService`].
///
/// A missing item is not an error; lookups return `Ok(None)` instead.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The backing store could not be reached or rejected an operation.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A stored blob could not be decoded (or a value could not be encoded).
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The store was constructed with unusable settings.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
