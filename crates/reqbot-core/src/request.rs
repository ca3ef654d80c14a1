use crate::fields::FieldMap;
use crate::id::RequestId;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// An HTTP request captured into a bucket.
///
/// The id and timestamp are assigned once by [`CapturedRequestBuilder::build`]
/// and never change afterwards; the struct exposes no mutators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedRequest {
    bucket: String,
    headers: FieldMap,
    #[serde(deserialize_with = "Option::deserialize")]
    body: Option<String>,
    query_parameters: FieldMap,
    method: String,
    path: String,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    id: RequestId,
}

impl CapturedRequest {
    /// Start building a request addressed to `bucket`.
    pub fn builder(bucket: impl Into<String>) -> CapturedRequestBuilder {
        CapturedRequestBuilder::new(bucket)
    }

    /// Bucket the request was captured into.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Request headers.
    pub const fn headers(&self) -> &FieldMap {
        &self.headers
    }

    /// Raw request body, if one was sent.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Query-string parameters.
    pub const fn query_parameters(&self) -> &FieldMap {
        &self.query_parameters
    }

    /// HTTP method token, e.g. `POST`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Capture time (UTC).
    pub const fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    /// Unique request identifier.
    pub const fn id(&self) -> RequestId {
        self.id
    }
}

/// Builder for [`CapturedRequest`].
#[derive(Debug, Clone)]
pub struct CapturedRequestBuilder {
    bucket: String,
    headers: FieldMap,
    body: Option<String>,
    query_parameters: FieldMap,
    method: String,
    path: Option<String>,
}

impl CapturedRequestBuilder {
    fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            headers: FieldMap::new(),
            body: None,
            query_parameters: FieldMap::new(),
            method: "GET".to_owned(),
            path: None,
        }
    }

    /// Add a single header; a repeated key overwrites the earlier value.
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

    /// Add a single query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_parameters.insert(key, value);
        self
    }

    /// Merge a set of query parameters.
    #[must_use]
    pub fn query_parameters(mut self, params: FieldMap) -> Self {
        for (k, v) in params {
            self.query_parameters.insert(k, v);
        }
        self
    }

    /// Set the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set or clear the request body.
    #[must_use]
    pub fn maybe_body(mut self, body: Option<String>) -> Self {
        self.body = body;
        self
    }

    /// Set the HTTP method token.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Set the request path. Defaults to `/<bucket>`.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Finish the request, stamping a fresh id and the current time.
    #[must_use]
    pub fn build(self) -> CapturedRequest {
        let path = self.path.unwrap_or_else(|| format!("/{}", self.bucket));
        CapturedRequest {
            bucket: self.bucket,
            headers: self.headers,
            body: self.body,
            query_parameters: self.query_parameters,
            method: self.method,
            path,
            timestamp: OffsetDateTime::now_utc(),
            id: RequestId::new(),
        }
    }
}
