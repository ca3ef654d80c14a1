//! Operations that can be queued into an atomic batch, and their replies.

use crate::error::BackendError;

/// A single backend operation.
///
/// List indices follow the usual ordered-list convention: index 0 is the
/// front (most recently pushed) item and negative indices count back from the
/// tail, so `-1` is the oldest item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Read a scalar value.
    Get {
        /// Target key.
        key: String,
    },
    /// Write a scalar value.
    Set {
        /// Target key.
        key: String,
        /// Value to store.
        value: String,
    },
    /// Remove a key of any kind.
    Delete {
        /// Target key.
        key: String,
    },
    /// Push a value onto the front of a list, creating it if needed.
    ListPushFront {
        /// Target list.
        key: String,
        /// Value to push.
        value: String,
    },
    /// Keep only the items within `start..=stop`.
    ListTrim {
        /// Target list.
        key: String,
        /// First index to keep.
        start: i64,
        /// Last index to keep (inclusive).
        stop: i64,
    },
    /// Read the items within `start..=stop`.
    ListRange {
        /// Target list.
        key: String,
        /// First index to read.
        start: i64,
        /// Last index to read (inclusive, clamped to the list).
        stop: i64,
    },
    /// Read the item at `index`.
    ListIndex {
        /// Target list.
        key: String,
        /// Position to read.
        index: i64,
    },
    /// Number of items in a list (0 when missing).
    ListLength {
        /// Target list.
        key: String,
    },
    /// Every key that starts with `prefix`.
    KeysByPrefix {
        /// Literal key prefix.
        prefix: String,
    },
}

impl Op {
    /// [`Op::Get`]
    pub fn get(key: impl Into<String>) -> Self {
        Self::Get { key: key.into() }
    }

    /// [`Op::Set`]
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    /// [`Op::Delete`]
    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    /// [`Op::ListPushFront`]
    pub fn push_front(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ListPushFront {
            key: key.into(),
            value: value.into(),
        }
    }

    /// [`Op::ListTrim`]
    pub fn trim(key: impl Into<String>, start: i64, stop: i64) -> Self {
        Self::ListTrim {
            key: key.into(),
            start,
            stop,
        }
    }

    /// [`Op::ListRange`]
    pub fn range(key: impl Into<String>, start: i64, stop: i64) -> Self {
        Self::ListRange {
            key: key.into(),
            start,
            stop,
        }
    }

    /// [`Op::ListIndex`]
    pub fn index(key: impl Into<String>, index: i64) -> Self {
        Self::ListIndex {
            key: key.into(),
            index,
        }
    }

    /// [`Op::ListLength`]
    pub fn length(key: impl Into<String>) -> Self {
        Self::ListLength { key: key.into() }
    }

    /// [`Op::KeysByPrefix`]
    pub fn keys(prefix: impl Into<String>) -> Self {
        Self::KeysByPrefix { prefix: prefix.into() }
    }
}

/// Result of one executed [`Op`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// No value (missing key or index out of range).
    Nil,
    /// Write acknowledged.
    Ok,
    /// Counter or length.
    Integer(i64),
    /// A single value.
    Value(String),
    /// An ordered sequence of values.
    Values(Vec<String>),
}

impl Reply {
    const fn shape(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Ok => "ok",
            Self::Integer(_) => "integer",
            Self::Value(_) => "value",
            Self::Values(_) => "values",
        }
    }

    fn unexpected(&self, expected: &'static str) -> BackendError {
        BackendError::UnexpectedReply {
            expected,
            found: self.shape().to_owned(),
        }
    }

    /// Interpret as an optional single value.
    ///
    /// # Errors
    /// Returns [`BackendError::UnexpectedReply`] for any other shape.
    pub fn into_optional(self) -> Result<Option<String>, BackendError> {
        match self {
            Self::Nil => Ok(None),
            Self::Value(v) => Ok(Some(v)),
            other => Err(other.unexpected("value or nil")),
        }
    }

    /// Interpret as a sequence of values.
    ///
    /// # Errors
    /// Returns [`BackendError::UnexpectedReply`] for any other shape.
    pub fn into_values(self) -> Result<Vec<String>, BackendError> {
        match self {
            Self::Values(v) => Ok(v),
            other => Err(other.unexpected("values")),
        }
    }

    /// Interpret as an integer.
    ///
    /// # Errors
    /// Returns [`BackendError::UnexpectedReply`] for any other shape.
    pub fn into_integer(self) -> Result<i64, BackendError> {
        match self {
            Self::Integer(n) => Ok(n),
            other => Err(other.unexpected("integer")),
        }
    }

    /// Interpret as a write acknowledgement.
    ///
    /// # Errors
    /// Returns [`BackendError::UnexpectedReply`] for any other shape.
    pub fn into_ok(self) -> Result<(), BackendError> {
        match self {
            Self::Ok => Ok(()),
            other => Err(other.unexpected("ok")),
        }
    }
}

impl From<Option<String>> for Reply {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Nil, Self::Value)
    }
}
