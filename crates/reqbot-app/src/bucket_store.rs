//! Capped, most-recent-first request buckets.

use std::num::NonZeroUsize;
use std::sync::Arc;

use reqbot_core::keys::{self, BUCKET_PREFIX};
use reqbot_core::{CapturedRequest, RequestId, codec};
use reqbot_store::{Backend, BackendError, Op, Reply};
use tracing::{debug, warn};

use crate::error::{RepoError, Result};

/// Keeps the newest `capacity` requests of every bucket.
///
/// Each bucket is a list of request ids under `bucket:<name>`, newest first,
/// and each live id has its encoded request under `request:<id>`. A save reads
/// the id about to fall off the tail, pushes the new id, writes the content
/// and trims the list, all in one atomic batch. The evicted content is
/// deleted afterwards.
pub struct CappedBucketStore<B: ?Sized> {
    backend: Arc<B>,
    capacity: NonZeroUsize,
}

impl<B: Backend + ?Sized> CappedBucketStore<B> {
    /// Create a store keeping at most `capacity` requests per bucket.
    ///
    /// # Errors
    /// Returns [`RepoError::InvalidConfiguration`] when `capacity` is zero.
    pub fn new(backend: Arc<B>, capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            RepoError::InvalidConfiguration(format!("bucket capacity must be at least 1, got {capacity}"))
        })?;
        Ok(Self { backend, capacity })
    }

    /// Maximum number of requests retained per bucket.
    pub const fn capacity(&self) -> usize {
        self.capacity.get()
    }

    fn tail_index(&self) -> i64 {
        i64::try_from(self.capacity.get() - 1).unwrap_or(i64::MAX)
    }

    /// Record `request` in its bucket, evicting the oldest entry if the bucket is full.
    ///
    /// # Errors
    /// Returns an error if encoding fails or the backend rejects the batch or
    /// the follow-up delete.
    pub fn save(&self, request: &CapturedRequest) -> Result<()> {
        let index_key = keys::bucket_key(request.bucket());
        let id = request.id().to_string();
        let encoded = codec::encode_request(request)?;
        let tail = self.tail_index();

        // The tail read must precede the push so it names the outgoing id.
        // The trailing range read sees the index as the batch left it.
        let replies = self.backend.execute_atomic(&[
            Op::index(&index_key, tail),
            Op::push_front(&index_key, &id),
            Op::set(keys::request_key(request.id()), encoded),
            Op::trim(&index_key, 0, tail),
            Op::range(&index_key, 0, tail),
        ])?;
        let mut replies = replies.into_iter();
        let victim = expect_reply(replies.next(), "tail read reply")?.into_optional()?;
        let retained = expect_reply(replies.nth(3), "retained range reply")?.into_values()?;
        debug!(bucket = request.bucket(), %id, "Saved request");

        // A re-saved id can be both the victim and still indexed.
        if let Some(victim) = victim.filter(|victim| !retained.contains(victim)) {
            self.backend.delete(&keys::request_key_raw(&victim))?;
            debug!(bucket = request.bucket(), evicted = %victim, "Evicted request");
        }
        Ok(())
    }

    /// Up to `limit` requests from `bucket`, newest first.
    ///
    /// Index entries whose content has gone missing are skipped.
    ///
    /// # Errors
    /// Returns an error if the backend fails or a stored request cannot be decoded.
    pub fn get_recent(&self, bucket: &str, limit: usize) -> Result<Vec<CapturedRequest>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let stop = i64::try_from(limit - 1).unwrap_or(i64::MAX);
        let ids = self.backend.list_range(&keys::bucket_key(bucket), 0, stop)?;

        let mut requests = Vec::with_capacity(ids.len());
        for id in ids {
            match self.backend.get(&keys::request_key_raw(&id))? {
                Some(raw) => requests.push(codec::decode_request(&raw)?),
                None => warn!(bucket, %id, "Bucket references a missing request"),
            }
        }
        Ok(requests)
    }

    /// Fetch a single captured request by id.
    ///
    /// # Errors
    /// Returns an error if the backend fails or the stored request cannot be decoded.
    pub fn get(&self, id: RequestId) -> Result<Option<CapturedRequest>> {
        self.backend
            .get(&keys::request_key(id))?
            .map(|raw| codec::decode_request(&raw))
            .transpose()
            .map_err(RepoError::from)
    }

    /// Names of all buckets that currently hold requests, sorted.
    ///
    /// # Errors
    /// Returns an error if key enumeration fails.
    pub fn list_buckets(&self) -> Result<Vec<String>> {
        let index_keys = self.backend.keys_by_prefix(BUCKET_PREFIX)?;
        Ok(keys::names_under(BUCKET_PREFIX, index_keys))
    }
}

fn expect_reply(reply: Option<Reply>, expected: &'static str) -> std::result::Result<Reply, BackendError> {
    reply.ok_or_else(|| BackendError::UnexpectedReply {
        expected,
        found: "missing reply".into(),
    })
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use reqbot_store::MemoryBackend;
    use std::sync::Mutex;

    fn request(bucket: &str) -> CapturedRequest {
        CapturedRequest::builder(bucket).method("POST").body("body\n").build()
    }

    fn store(capacity: usize) -> (Arc<MemoryBackend>, CappedBucketStore<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let store = CappedBucketStore::new(Arc::clone(&backend), capacity).expect("valid capacity");
        (backend, store)
    }

    fn ids(requests: &[CapturedRequest]) -> Vec<RequestId> {
        requests.iter().map(CapturedRequest::id).collect()
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result = CappedBucketStore::new(Arc::new(MemoryBackend::new()), 0);
        assert!(matches!(result, Err(RepoError::InvalidConfiguration(_))));
    }

    #[test]
    fn keeps_newest_three_of_five() {
        let (backend, store) = store(3);
        let saved: Vec<_> = (0..5).map(|_| request("x")).collect();
        for r in &saved {
            store.save(r).expect("save");
        }

        let recent = store.get_recent("x", 3).expect("get recent");
        assert_eq!(ids(&recent), vec![saved[4].id(), saved[3].id(), saved[2].id()]);
        for evicted in &saved[..2] {
            assert_eq!(backend.get(&keys::request_key(evicted.id())).expect("get"), None);
        }
    }

    #[test]
    fn bucket_length_grows_to_capacity_then_holds() {
        let (backend, store) = store(3);
        for i in 1..10_u64 {
            let r = request("x");
            store.save(&r).expect("save");
            assert_eq!(backend.list_len("bucket:x").expect("len"), i.min(3));
            assert!(store.get(r.id()).expect("get").is_some());
        }
        // three request blobs plus the bucket index
        assert_eq!(backend.keys_by_prefix("").expect("keys").len(), 4);
    }

    #[test]
    fn short_bucket_evicts_nothing() {
        let (backend, store) = store(3);
        let first = request("x");
        store.save(&first).expect("save");
        store.save(&request("x")).expect("save");
        assert!(backend.get(&keys::request_key(first.id())).expect("get").is_some());
    }

    #[test]
    fn capacity_one_replaces_previous() {
        let (backend, store) = store(1);
        let first = request("x");
        let second = request("x");
        store.save(&first).expect("save");
        store.save(&second).expect("save");
        assert_eq!(ids(&store.get_recent("x", 5).expect("recent")), vec![second.id()]);
        assert_eq!(backend.get(&keys::request_key(first.id())).expect("get"), None);
    }

    #[test]
    fn resaving_the_same_request_keeps_its_content() {
        let (_backend, store) = store(1);
        let r = request("x");
        store.save(&r).expect("save");
        store.save(&r).expect("save again");
        assert_eq!(store.get(r.id()).expect("get"), Some(r));
    }

    #[test]
    fn resaving_inside_a_full_bucket_leaves_no_dangling_ids() {
        let (backend, store) = store(3);
        let saved: Vec<_> = (0..3).map(|_| request("x")).collect();
        for r in &saved {
            store.save(r).expect("save");
        }
        store.save(&saved[1]).expect("save again");
        store.save(&request("x")).expect("save newer");

        let index = backend.list_range("bucket:x", 0, -1).expect("index");
        assert_eq!(index.len(), 3);
        for id in &index {
            assert!(
                backend.get(&keys::request_key_raw(id)).expect("get").is_some(),
                "index entry {id} has no content"
            );
        }
        assert_eq!(store.get_recent("x", 3).expect("recent").len(), 3);
        assert!(store.get(saved[1].id()).expect("get").is_some());
    }

    #[test]
    fn buckets_are_independent() {
        let (_backend, store) = store(1);
        let a = request("a");
        let b = request("b");
        store.save(&a).expect("save");
        store.save(&b).expect("save");
        assert_eq!(ids(&store.get_recent("a", 1).expect("recent")), vec![a.id()]);
        assert_eq!(ids(&store.get_recent("b", 1).expect("recent")), vec![b.id()]);
    }

    #[test]
    fn limit_bounds_the_read() {
        let (_backend, store) = store(5);
        let saved: Vec<_> = (0..4).map(|_| request("x")).collect();
        for r in &saved {
            store.save(r).expect("save");
        }
        assert_eq!(ids(&store.get_recent("x", 2).expect("recent")), vec![saved[3].id(), saved[2].id()]);
        assert!(store.get_recent("x", 0).expect("recent").is_empty());
        assert_eq!(store.get_recent("x", 100).expect("recent").len(), 4);
        assert!(store.get_recent("unknown", 3).expect("recent").is_empty());
    }

    #[test]
    fn request_survives_the_store() {
        let (_backend, store) = store(3);
        let original = CapturedRequest::builder("x")
            .header("h", "v")
            .body("hello")
            .query("q", "1")
            .method("POST")
            .path("/x/a")
            .build();
        store.save(&original).expect("save");

        let loaded = store.get(original.id()).expect("get").expect("present");
        assert_eq!(loaded.bucket(), "x");
        assert_eq!(loaded.headers().get("h"), Some("v"));
        assert_eq!(loaded.body(), Some("hello"));
        assert_eq!(loaded.query_parameters().get("q"), Some("1"));
        assert_eq!(loaded.method(), "POST");
        assert_eq!(loaded.path(), "/x/a");
        assert_eq!(loaded.id(), original.id());
        assert_eq!(loaded.timestamp(), original.timestamp());
    }

    #[test]
    fn consecutive_reads_agree() {
        let (_backend, store) = store(3);
        for _ in 0..4 {
            store.save(&request("x")).expect("save");
        }
        let first = store.get_recent("x", 3).expect("recent");
        let second = store.get_recent("x", 3).expect("recent");
        assert_eq!(first, second);
    }

    #[test]
    fn lists_buckets_sorted() {
        let (_backend, store) = store(3);
        for bucket in ["b", "a", "c", "a"] {
            store.save(&request(bucket)).expect("save");
        }
        assert_eq!(store.list_buckets().expect("list"), vec!["a", "b", "c"]);
    }

    #[test]
    fn dangling_index_entries_are_skipped() {
        let (backend, store) = store(3);
        let kept = request("x");
        store.save(&kept).expect("save");
        backend
            .list_push_front("bucket:x", &RequestId::new().to_string())
            .expect("push dangling id");

        assert_eq!(ids(&store.get_recent("x", 3).expect("recent")), vec![kept.id()]);
    }

    #[test]
    fn corrupt_content_is_an_error() {
        let (backend, store) = store(3);
        let id = RequestId::new();
        backend.list_push_front("bucket:x", &id.to_string()).expect("push");
        backend.set(&keys::request_key(id), "{not json").expect("set");

        assert!(matches!(store.get_recent("x", 3), Err(RepoError::Codec(_))));
        assert!(matches!(store.get(id), Err(RepoError::Codec(_))));
    }

    /// Records every batch before handing it to an in-memory backend.
    #[derive(Default)]
    struct RecordingBackend {
        inner: MemoryBackend,
        batches: Mutex<Vec<Vec<Op>>>,
    }

    impl Backend for RecordingBackend {
        fn get(&self, key: &str) -> std::result::Result<Option<String>, BackendError> {
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: &str) -> std::result::Result<(), BackendError> {
            self.inner.set(key, value)
        }
        fn delete(&self, key: &str) -> std::result::Result<(), BackendError> {
            self.inner.delete(key)
        }
        fn list_push_front(&self, key: &str, value: &str) -> std::result::Result<u64, BackendError> {
            self.inner.list_push_front(key, value)
        }
        fn list_trim(&self, key: &str, start: i64, stop: i64) -> std::result::Result<(), BackendError> {
            self.inner.list_trim(key, start, stop)
        }
        fn list_range(&self, key: &str, start: i64, stop: i64) -> std::result::Result<Vec<String>, BackendError> {
            self.inner.list_range(key, start, stop)
        }
        fn list_index(&self, key: &str, index: i64) -> std::result::Result<Option<String>, BackendError> {
            self.inner.list_index(key, index)
        }
        fn list_len(&self, key: &str) -> std::result::Result<u64, BackendError> {
            self.inner.list_len(key)
        }
        fn keys_by_prefix(&self, prefix: &str) -> std::result::Result<Vec<String>, BackendError> {
            self.inner.keys_by_prefix(prefix)
        }
        fn execute_atomic(&self, ops: &[Op]) -> std::result::Result<Vec<Reply>, BackendError> {
            self.batches.lock().expect("lock batches").push(ops.to_vec());
            self.inner.execute_atomic(ops)
        }
    }

    #[test]
    fn save_issues_read_push_write_trim() {
        let backend = Arc::new(RecordingBackend::default());
        let store = CappedBucketStore::new(Arc::clone(&backend), 3).expect("store");
        let r = request("x");
        store.save(&r).expect("save");

        let batches = backend.batches.lock().expect("lock batches");
        assert_eq!(batches.len(), 1);
        let ops = &batches[0];
        assert_eq!(ops.len(), 5);
        assert_eq!(ops[0], Op::index("bucket:x", 2));
        assert_eq!(ops[1], Op::push_front("bucket:x", r.id().to_string()));
        assert!(matches!(&ops[2], Op::Set { key, .. } if *key == keys::request_key(r.id())));
        assert_eq!(ops[3], Op::trim("bucket:x", 0, 2));
        assert_eq!(ops[4], Op::range("bucket:x", 0, 2));
    }

    struct DownBackend;

    impl DownBackend {
        fn down<T>() -> std::result::Result<T, BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }
    }

    impl Backend for DownBackend {
        fn get(&self, _: &str) -> std::result::Result<Option<String>, BackendError> {
            Self::down()
        }
        fn set(&self, _: &str, _: &str) -> std::result::Result<(), BackendError> {
            Self::down()
        }
        fn delete(&self, _: &str) -> std::result::Result<(), BackendError> {
            Self::down()
        }
        fn list_push_front(&self, _: &str, _: &str) -> std::result::Result<u64, BackendError> {
            Self::down()
        }
        fn list_trim(&self, _: &str, _: i64, _: i64) -> std::result::Result<(), BackendError> {
            Self::down()
        }
        fn list_range(&self, _: &str, _: i64, _: i64) -> std::result::Result<Vec<String>, BackendError> {
            Self::down()
        }
        fn list_index(&self, _: &str, _: i64) -> std::result::Result<Option<String>, BackendError> {
            Self::down()
        }
        fn list_len(&self, _: &str) -> std::result::Result<u64, BackendError> {
            Self::down()
        }
        fn keys_by_prefix(&self, _: &str) -> std::result::Result<Vec<String>, BackendError> {
            Self::down()
        }
        fn execute_atomic(&self, _: &[Op]) -> std::result::Result<Vec<Reply>, BackendError> {
            Self::down()
        }
    }

    #[test]
    fn backend_failures_propagate() {
        let store = CappedBucketStore::new(Arc::new(DownBackend), 3).expect("store");
        assert!(matches!(
            store.save(&request("x")),
            Err(RepoError::Backend(BackendError::Unavailable(_)))
        ));
        assert!(matches!(store.list_buckets(), Err(RepoError::Backend(_))));
        assert!(matches!(store.get_recent("x", 1), Err(RepoError::Backend(_))));
    }
}
