//! Storage layer and service façade for reqbot.
//!
//! [`CappedBucketStore`] keeps the newest N captured requests per bucket and
//! [`TagIndexedStore`] keeps responses reachable by id and by tag. Both sit on
//! a shared [`reqbot_store::Backend`] and express every write as one atomic
//! batch. [`ReqbotService`] bundles them for the HTTP layer.

pub mod async_service;
pub mod bucket_store;
pub mod config;
pub mod error;
pub mod response_store;
pub mod service;

// Re-exports for convenience
pub use async_service::AsyncReqbotService;
pub use bucket_store::CappedBucketStore;
pub use config::{ConfigError, RedisSettings, ReqbotConfig, RequestSettings};
pub use error::{RepoError, Result};
pub use response_store::TagIndexedStore;
pub use service::{CaptureInput, NewResponse, ReqbotService};
