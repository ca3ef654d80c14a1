//! Async adapter for use from async HTTP handlers.

use std::sync::Arc;

use reqbot_core::{CapturedRequest, StoredResponse};
use reqbot_store::{Backend, BackendError};

use crate::error::{RepoError, Result};
use crate::service::{CaptureInput, NewResponse, ReqbotService};

/// Runs each [`ReqbotService`] call on tokio's blocking pool so backend I/O
/// never stalls the async executor.
pub struct AsyncReqbotService<B: ?Sized> {
    inner: Arc<ReqbotService<B>>,
}

impl<B: ?Sized> Clone for AsyncReqbotService<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Backend + ?Sized + 'static> AsyncReqbotService<B> {
    /// Wrap a shared service.
    pub const fn new(inner: Arc<ReqbotService<B>>) -> Self {
        Self { inner }
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&ReqbotService<B>) -> Result<T> + Send + 'static,
    {
        let service = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&*service))
            .await
            .map_err(|e| RepoError::Backend(BackendError::Unavailable(format!("Task join error: {e}"))))?
    }

    /// See [`ReqbotService::save_request`].
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn save_request(&self, request: CapturedRequest) -> Result<()> {
        self.run(move |s| s.save_request(&request)).await
    }

    /// See [`ReqbotService::capture_request`].
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn capture_request(&self, input: CaptureInput) -> Result<CapturedRequest> {
        self.run(move |s| s.capture_request(input)).await
    }

    /// See [`ReqbotService::get_bucket`].
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn get_bucket(&self, name: String, limit: usize) -> Result<Vec<CapturedRequest>> {
        self.run(move |s| s.get_bucket(&name, limit)).await
    }

    /// See [`ReqbotService::list_buckets`].
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn list_buckets(&self) -> Result<Vec<String>> {
        self.run(ReqbotService::list_buckets).await
    }

    /// See [`ReqbotService::create_response`].
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn create_response(&self, input: NewResponse) -> Result<StoredResponse> {
        self.run(move |s| s.create_response(input)).await
    }

    /// See [`ReqbotService::save_response`].
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn save_response(&self, response: StoredResponse) -> Result<()> {
        self.run(move |s| s.save_response(&response)).await
    }

    /// See [`ReqbotService::get_response`].
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn get_response(&self, id: String) -> Result<Option<StoredResponse>> {
        self.run(move |s| s.get_response(&id)).await
    }

    /// See [`ReqbotService::list_all_responses`].
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn list_all_responses(&self) -> Result<Vec<StoredResponse>> {
        self.run(ReqbotService::list_all_responses).await
    }

    /// See [`ReqbotService::get_responses_by_tag`].
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn get_responses_by_tag(&self, tag: String) -> Result<Vec<StoredResponse>> {
        self.run(move |s| s.get_responses_by_tag(&tag)).await
    }

    /// See [`ReqbotService::list_tags`].
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn list_tags(&self) -> Result<Vec<String>> {
        self.run(ReqbotService::list_tags).await
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use reqbot_core::FieldMap;
    use reqbot_store::MemoryBackend;

    fn service(capacity: usize) -> AsyncReqbotService<MemoryBackend> {
        let inner = ReqbotService::new(Arc::new(MemoryBackend::new()), capacity).expect("service");
        AsyncReqbotService::new(Arc::new(inner))
    }

    #[tokio::test]
    async fn captures_and_lists_through_blocking_pool() {
        let service = service(2);
        for path in ["/a", "/b", "/c"] {
            service
                .capture_request(CaptureInput {
                    bucket: "x".into(),
                    method: "POST".into(),
                    path: path.into(),
                    headers: FieldMap::new(),
                    query: FieldMap::new(),
                    body: None,
                })
                .await
                .expect("capture");
        }

        let paths: Vec<String> = service
            .get_bucket("x".into(), 10)
            .await
            .expect("bucket")
            .iter()
            .map(|r| r.path().to_owned())
            .collect();
        assert_eq!(paths, vec!["/c", "/b"]);
        assert_eq!(service.list_buckets().await.expect("buckets"), vec!["x"]);
    }

    #[tokio::test]
    async fn responses_round_trip() -> anyhow::Result<()> {
        let service = service(3);
        let created = service
            .create_response(NewResponse {
                headers: FieldMap::new(),
                body: "pong".into(),
                tags: vec!["ping".into()],
            })
            .await?;

        let fetched = service.get_response(created.id().to_string()).await?;
        assert_eq!(fetched, Some(created.clone()));
        assert_eq!(service.get_responses_by_tag("ping".into()).await?, vec![created]);
        assert_eq!(service.list_tags().await?, vec!["ping"]);
        assert_eq!(service.get_response("not-an-id".into()).await?, None);
        Ok(())
    }
}
