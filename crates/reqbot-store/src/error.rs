//! Error types for backend operations.

use thiserror::Error;

/// Errors that can occur while talking to a [`crate::Backend`].
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection or I/O failure talking to the remote store.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// A list operation hit a scalar key, or the other way around.
    #[error("Key holds the wrong kind of value: {0}")]
    WrongType(String),

    /// The store answered with a reply of the wrong shape.
    #[error("Unexpected reply: expected {expected}, got {found}")]
    UnexpectedReply {
        /// Reply shape the caller asked for.
        expected: &'static str,
        /// Reply shape actually received.
        found: String,
    },
}

impl From<redis::RedisError> for BackendError {
    fn from(err: redis::RedisError) -> Self {
        if err.code() == Some("WRONGTYPE") {
            Self::WrongType(err.to_string())
        } else if err.kind() == redis::ErrorKind::TypeError {
            Self::UnexpectedReply {
                expected: "typed reply",
                found: err.to_string(),
            }
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}
