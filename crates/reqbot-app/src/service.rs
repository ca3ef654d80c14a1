//! Service façade combining the request and response stores.

use std::sync::Arc;

use reqbot_core::{CapturedRequest, FieldMap, RequestId, ResponseId, StoredResponse};
use reqbot_store::Backend;

use crate::bucket_store::CappedBucketStore;
use crate::error::Result;
use crate::response_store::TagIndexedStore;

/// Raw parts of an incoming HTTP request to capture.
#[derive(Debug, Clone, Default)]
pub struct CaptureInput {
    /// Target bucket.
    pub bucket: String,
    /// HTTP method token.
    pub method: String,
    /// Request path; defaults to `/<bucket>` when empty.
    pub path: String,
    /// Request headers.
    pub headers: FieldMap,
    /// Query-string parameters.
    pub query: FieldMap,
    /// Request body, if any.
    pub body: Option<String>,
}

/// Input for registering a new response.
#[derive(Debug, Clone, Default)]
pub struct NewResponse {
    /// Headers to send.
    pub headers: FieldMap,
    /// Body to send.
    pub body: String,
    /// Tags to index the response under.
    pub tags: Vec<String>,
}

/// Service façade consumed by the HTTP layer.
///
/// Both stores share one backend handle.
pub struct ReqbotService<B: ?Sized> {
    requests: CappedBucketStore<B>,
    responses: TagIndexedStore<B>,
}

impl<B: Backend + ?Sized> ReqbotService<B> {
    /// Build the service over `backend`, keeping `capacity` requests per bucket.
    ///
    /// # Errors
    /// Returns [`crate::RepoError::InvalidConfiguration`] when `capacity` is zero.
    pub fn new(backend: Arc<B>, capacity: usize) -> Result<Self> {
        Ok(Self {
            requests: CappedBucketStore::new(Arc::clone(&backend), capacity)?,
            responses: TagIndexedStore::new(backend),
        })
    }

    /// Requests retained per bucket.
    pub const fn capacity(&self) -> usize {
        self.requests.capacity()
    }

    /// Save an already-built request.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn save_request(&self, request: &CapturedRequest) -> Result<()> {
        self.requests.save(request)
    }

    /// Build a request from raw HTTP parts and save it.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn capture_request(&self, input: CaptureInput) -> Result<CapturedRequest> {
        let CaptureInput {
            bucket,
            method,
            path,
            headers,
            query,
            body,
        } = input;

        let mut builder = CapturedRequest::builder(bucket)
            .method(method)
            .headers(headers)
            .query_parameters(query)
            .maybe_body(body);
        if !path.is_empty() {
            builder = builder.path(path);
        }
        let request = builder.build();
        self.requests.save(&request)?;
        Ok(request)
    }

    /// Up to `limit` requests from bucket `name`, newest first.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn get_bucket(&self, name: &str, limit: usize) -> Result<Vec<CapturedRequest>> {
        self.requests.get_recent(name, limit)
    }

    /// A single captured request; malformed ids are reported as absent.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn get_request(&self, id: &str) -> Result<Option<CapturedRequest>> {
        match id.parse::<RequestId>() {
            Ok(id) => self.requests.get(id),
            Err(_) => Ok(None),
        }
    }

    /// Sorted names of non-empty buckets.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn list_buckets(&self) -> Result<Vec<String>> {
        self.requests.list_buckets()
    }

    /// Save an already-built response.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn save_response(&self, response: &StoredResponse) -> Result<()> {
        self.responses.save(response)
    }

    /// Build a response from its parts and save it.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn create_response(&self, input: NewResponse) -> Result<StoredResponse> {
        let NewResponse { headers, body, tags } = input;
        let response = StoredResponse::builder()
            .headers(headers)
            .body(body)
            .tags(tags)
            .build();
        self.responses.save(&response)?;
        Ok(response)
    }

    /// A single response; malformed ids are reported as absent.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn get_response(&self, id: &str) -> Result<Option<StoredResponse>> {
        match id.parse::<ResponseId>() {
            Ok(id) => self.responses.get(id),
            Err(_) => Ok(None),
        }
    }

    /// Every stored response, in no particular order.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn list_all_responses(&self) -> Result<Vec<StoredResponse>> {
        self.responses.get_all()
    }

    /// Responses carrying `tag`, newest first.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn get_responses_by_tag(&self, tag: &str) -> Result<Vec<StoredResponse>> {
        self.responses.get_by_tag(tag)
    }

    /// Sorted tag names, including `none` once an untagged response exists.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn list_tags(&self) -> Result<Vec<String>> {
        self.responses.list_tags()
    }
}
