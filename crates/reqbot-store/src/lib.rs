//! Key-value backends for reqbot.
//!
//! [`Backend`] is the capability set the stores rely on: scalar reads and
//! writes, ordered lists, prefix enumeration, and one cross-key primitive,
//! [`Backend::execute_atomic`]. Everything the stores promise about
//! consistency rests on that batch executing without interleaving.

pub mod error;
pub mod memory;
pub mod op;
pub mod redis_backend;

pub use error::BackendError;
pub use memory::MemoryBackend;
pub use op::{Op, Reply};
pub use redis_backend::RedisBackend;

/// Remote ordered key-value store.
///
/// Individual calls are not isolated from each other. Implementations must
/// run [`execute_atomic`](Self::execute_atomic) batches as one unit: no
/// other client's operation may interleave. Whether a batch that fails
/// part-way is undone depends on the implementation; see
/// [`MemoryBackend`] and [`RedisBackend`].
pub trait Backend: Send + Sync {
    /// Read a scalar value.
    ///
    /// # Errors
    /// Returns [`BackendError`] when the store cannot be reached or the key holds a list.
    fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Write a scalar value.
    ///
    /// # Errors
    /// Returns [`BackendError`] when the store cannot be reached.
    fn set(&self, key: &str, value: &str) -> Result<(), BackendError>;

    /// Remove a key of any kind. Removing a missing key is not an error.
    ///
    /// # Errors
    /// Returns [`BackendError`] when the store cannot be reached.
    fn delete(&self, key: &str) -> Result<(), BackendError>;

    /// Push onto the front of a list and return its new length.
    ///
    /// # Errors
    /// Returns [`BackendError`] when the store cannot be reached or the key holds a scalar.
    fn list_push_front(&self, key: &str, value: &str) -> Result<u64, BackendError>;

    /// Keep only the items within `start..=stop`.
    ///
    /// # Errors
    /// Returns [`BackendError`] when the store cannot be reached or the key holds a scalar.
    fn list_trim(&self, key: &str, start: i64, stop: i64) -> Result<(), BackendError>;

    /// Read the items within `start..=stop`, front first.
    ///
    /// # Errors
    /// Returns [`BackendError`] when the store cannot be reached or the key holds a scalar.
    fn list_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, BackendError>;

    /// Read the item at `index`.
    ///
    /// # Errors
    /// Returns [`BackendError`] when the store cannot be reached or the key holds a scalar.
    fn list_index(&self, key: &str, index: i64) -> Result<Option<String>, BackendError>;

    /// Number of items in a list; missing lists are empty.
    ///
    /// # Errors
    /// Returns [`BackendError`] when the store cannot be reached or the key holds a scalar.
    fn list_len(&self, key: &str) -> Result<u64, BackendError>;

    /// Every key starting with `prefix`, each reported once, in no particular order.
    ///
    /// # Errors
    /// Returns [`BackendError`] when the store cannot be reached.
    fn keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>, BackendError>;

    /// Run `ops` in order as one isolated, all-or-nothing unit and return one
    /// reply per op.
    ///
    /// # Errors
    /// Returns [`BackendError`] when the store cannot be reached or any op fails.
    fn execute_atomic(&self, ops: &[Op]) -> Result<Vec<Reply>, BackendError>;
}
