use crate::fields::FieldMap;
use crate::id::ResponseId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A pre-programmed response, addressable by id and by each of its tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    headers: FieldMap,
    body: String,
    tags: BTreeSet<String>,
    id: ResponseId,
}

impl StoredResponse {
    /// Start building a response.
    #[must_use]
    pub fn builder() -> StoredResponseBuilder {
        StoredResponseBuilder::default()
    }

    /// Headers to send with the response.
    pub const fn headers(&self) -> &FieldMap {
        &self.headers
    }

    /// Response body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Tags the response is indexed under.
    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Unique response identifier.
    pub const fn id(&self) -> ResponseId {
        self.id
    }
}

/// Builder for [`StoredResponse`].
#[derive(Debug, Clone, Default)]
pub struct StoredResponseBuilder {
    headers: FieldMap,
    body: String,
    tags: BTreeSet<String>,
}

impl StoredResponseBuilder {
    /// Add a header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Merge a set of headers.
    #[must_use]
    pub fn headers(mut self, headers: FieldMap) -> Self {
        for (k, v) in headers {
            self.headers.insert(k, v);
        }
        self
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a tag. Repeated tags collapse into one.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Add several tags.
    #[must_use]
    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Finish the response with a fresh id.
    #[must_use]
    pub fn build(self) -> StoredResponse {
        StoredResponse {
            headers: self.headers,
            body: self.body,
            tags: self.tags,
            id: ResponseId::new(),
        }
    }
}
