//! Responses indexed by id and by tag.

use std::sync::Arc;

use reqbot_core::keys::{self, NO_TAGS, RESPONSE_PREFIX, TAG_PREFIX};
use reqbot_core::{ResponseId, StoredResponse, codec};
use reqbot_store::{Backend, Op};
use tracing::{debug, warn};

use crate::error::Result;

/// Stores responses under `response:<id>` and fans each one out to a
/// `tag:<tag>` list per tag. Responses saved without tags go under the
/// `none` tag. Nothing is ever evicted.
pub struct TagIndexedStore<B: ?Sized> {
    backend: Arc<B>,
}

impl<B: Backend + ?Sized> TagIndexedStore<B> {
    /// Create a store on top of `backend`.
    pub const fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Persist `response` and index it under each of its tags in one atomic batch.
    ///
    /// # Errors
    /// Returns an error if encoding fails or the backend rejects the batch.
    pub fn save(&self, response: &StoredResponse) -> Result<()> {
        let content_key = keys::response_key(response.id());
        let encoded = codec::encode_response(response)?;

        let mut ops: Vec<Op> = if response.tags().is_empty() {
            vec![Op::push_front(keys::tag_key(NO_TAGS), &content_key)]
        } else {
            response
                .tags()
                .iter()
                .map(|tag| Op::push_front(keys::tag_key(tag), &content_key))
                .collect()
        };
        ops.push(Op::set(&content_key, encoded));

        self.backend.execute_atomic(&ops)?;
        debug!(id = %response.id(), tags = response.tags().len(), "Saved response");
        Ok(())
    }

    /// Look up a response by id.
    ///
    /// # Errors
    /// Returns an error if the backend fails or the stored response cannot be decoded.
    pub fn get(&self, id: ResponseId) -> Result<Option<StoredResponse>> {
        self.load(&keys::response_key(id))
    }

    fn load(&self, content_key: &str) -> Result<Option<StoredResponse>> {
        let Some(raw) = self.backend.get(content_key)? else {
            return Ok(None);
        };
        Ok(Some(codec::decode_response(&raw)?))
    }

    fn load_all<I>(&self, content_keys: I) -> Result<Vec<StoredResponse>>
    where
        I: IntoIterator<Item = String>,
    {
        let mut responses = Vec::new();
        for key in content_keys {
            match self.load(&key)? {
                Some(response) => responses.push(response),
                None => warn!(%key, "Skipping missing response"),
            }
        }
        Ok(responses)
    }

    /// Every stored response, in the backend's enumeration order.
    ///
    /// # Errors
    /// Returns an error if the backend fails or a stored response cannot be decoded.
    pub fn get_all(&self) -> Result<Vec<StoredResponse>> {
        let content_keys = self.backend.keys_by_prefix(RESPONSE_PREFIX)?;
        self.load_all(content_keys)
    }

    /// Responses saved with `tag`, most recently saved first.
    ///
    /// # Errors
    /// Returns an error if the backend fails or a stored response cannot be decoded.
    pub fn get_by_tag(&self, tag: &str) -> Result<Vec<StoredResponse>> {
        let index_key = keys::tag_key(tag);
        let len = self.backend.list_len(&index_key)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        let stop = i64::try_from(len).unwrap_or(i64::MAX);
        let content_keys = self.backend.list_range(&index_key, 0, stop)?;
        self.load_all(content_keys)
    }

    /// All tag names in use, sorted. Includes `none` once an untagged response exists.
    ///
    /// # Errors
    /// Returns an error if key enumeration fails.
    pub fn list_tags(&self) -> Result<Vec<String>> {
        let index_keys = self.backend.keys_by_prefix(TAG_PREFIX)?;
        Ok(keys::names_under(TAG_PREFIX, index_keys))
    }
}
