//! In-process backend.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::error::BackendError;
use crate::op::{Op, Reply};
use crate::Backend;

#[derive(Debug, Clone)]
enum Entry {
    Scalar(String),
    List(VecDeque<String>),
}

type Keyspace = BTreeMap<String, Entry>;

/// Backend holding everything in a single mutex-guarded map.
///
/// Batches run with the mutex held, so they are fully isolated. A batch that
/// fails part-way is rolled back before the error is returned. List keys
/// disappear once they become empty, mirroring Redis.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<Keyspace>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Keyspace>, BackendError> {
        self.entries
            .lock()
            .map_err(|_| BackendError::Unavailable("memory backend lock poisoned".into()))
    }

    fn run(&self, op: &Op) -> Result<Reply, BackendError> {
        let mut entries = self.lock()?;
        apply(&mut entries, op)
    }
}

fn wrong_type(key: &str) -> BackendError {
    BackendError::WrongType(key.to_owned())
}

fn list<'a>(entries: &'a Keyspace, key: &str) -> Result<Option<&'a VecDeque<String>>, BackendError> {
    match entries.get(key) {
        None => Ok(None),
        Some(Entry::List(items)) => Ok(Some(items)),
        Some(Entry::Scalar(_)) => Err(wrong_type(key)),
    }
}

/// Resolve an inclusive `start..=stop` range against a list of `len` items.
fn bounds(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((usize::try_from(start).ok()?, usize::try_from(stop).ok()?))
}

fn position(len: usize, index: i64) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

fn count(n: usize) -> Reply {
    Reply::Integer(i64::try_from(n).unwrap_or(i64::MAX))
}

fn apply(entries: &mut Keyspace, op: &Op) -> Result<Reply, BackendError> {
    match op {
        Op::Get { key } => match entries.get(key) {
            None => Ok(Reply::Nil),
            Some(Entry::Scalar(value)) => Ok(Reply::Value(value.clone())),
            Some(Entry::List(_)) => Err(wrong_type(key)),
        },
        Op::Set { key, value } => {
            entries.insert(key.clone(), Entry::Scalar(value.clone()));
            Ok(Reply::Ok)
        }
        Op::Delete { key } => Ok(count(usize::from(entries.remove(key).is_some()))),
        Op::ListPushFront { key, value } => {
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| Entry::List(VecDeque::new()));
            match entry {
                Entry::List(items) => {
                    items.push_front(value.clone());
                    Ok(count(items.len()))
                }
                Entry::Scalar(_) => Err(wrong_type(key)),
            }
        }
        Op::ListTrim { key, start, stop } => {
            let Some(items) = list(entries, key)? else {
                return Ok(Reply::Ok);
            };
            match bounds(items.len(), *start, *stop) {
                Some((lo, hi)) => {
                    let kept: VecDeque<String> = items.range(lo..=hi).cloned().collect();
                    entries.insert(key.clone(), Entry::List(kept));
                }
                None => {
                    entries.remove(key);
                }
            }
            Ok(Reply::Ok)
        }
        Op::ListRange { key, start, stop } => {
            let values = list(entries, key)?
                .and_then(|items| {
                    bounds(items.len(), *start, *stop)
                        .map(|(lo, hi)| items.range(lo..=hi).cloned().collect())
                })
                .unwrap_or_default();
            Ok(Reply::Values(values))
        }
        Op::ListIndex { key, index } => {
            let value = list(entries, key)?
                .and_then(|items| position(items.len(), *index).and_then(|i| items.get(i)))
                .cloned();
            Ok(Reply::from(value))
        }
        Op::ListLength { key } => Ok(count(list(entries, key)?.map_or(0, VecDeque::len))),
        Op::KeysByPrefix { prefix } => {
            let keys = entries
                .range(prefix.clone()..)
                .take_while(|(key, _)| key.starts_with(prefix.as_str()))
                .map(|(key, _)| key.clone())
                .collect();
            Ok(Reply::Values(keys))
        }
    }
}

const fn written_key(op: &Op) -> Option<&String> {
    match op {
        Op::Set { key, .. }
        | Op::Delete { key }
        | Op::ListPushFront { key, .. }
        | Op::ListTrim { key, .. } => Some(key),
        Op::Get { .. }
        | Op::ListRange { .. }
        | Op::ListIndex { .. }
        | Op::ListLength { .. }
        | Op::KeysByPrefix { .. } => None,
    }
}

fn length(reply: Reply) -> Result<u64, BackendError> {
    let n = reply.into_integer()?;
    u64::try_from(n).map_err(|_| BackendError::UnexpectedReply {
        expected: "non-negative integer",
        found: n.to_string(),
    })
}

impl Backend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        self.run(&Op::get(key))?.into_optional()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        self.run(&Op::set(key, value))?.into_ok()
    }

    fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.run(&Op::delete(key)).map(|_| ())
    }

    fn list_push_front(&self, key: &str, value: &str) -> Result<u64, BackendError> {
        length(self.run(&Op::push_front(key, value))?)
    }

    fn list_trim(&self, key: &str, start: i64, stop: i64) -> Result<(), BackendError> {
        self.run(&Op::trim(key, start, stop))?.into_ok()
    }

    fn list_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, BackendError> {
        self.run(&Op::range(key, start, stop))?.into_values()
    }

    fn list_index(&self, key: &str, index: i64) -> Result<Option<String>, BackendError> {
        self.run(&Op::index(key, index))?.into_optional()
    }

    fn list_len(&self, key: &str) -> Result<u64, BackendError> {
        length(self.run(&Op::length(key))?)
    }

    fn keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
        self.run(&Op::keys(prefix))?.into_values()
    }

    fn execute_atomic(&self, ops: &[Op]) -> Result<Vec<Reply>, BackendError> {
        let mut entries = self.lock()?;
        let saved: Vec<(String, Option<Entry>)> = ops
            .iter()
            .filter_map(written_key)
            .map(|key| (key.clone(), entries.get(key).cloned()))
            .collect();

        let mut replies = Vec::with_capacity(ops.len());
        for op in ops {
            match apply(&mut entries, op) {
                Ok(reply) => replies.push(reply),
                Err(err) => {
                    // Earliest snapshot of a key is restored last.
                    for (key, previous) in saved.into_iter().rev() {
                        match previous {
                            Some(entry) => {
                                entries.insert(key, entry);
                            }
                            None => {
                                entries.remove(&key);
                            }
                        }
                    }
                    return Err(err);
                }
            }
        }
        drop(entries);
        Ok(replies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(key: &str, items: &[&str]) -> MemoryBackend {
        let backend = MemoryBackend::new();
        for item in items.iter().rev() {
            backend.list_push_front(key, item).expect("push");
        }
        backend
    }

    #[test]
    fn scalar_roundtrip_and_delete() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("k").expect("get"), None);
        backend.set("k", "v").expect("set");
        assert_eq!(backend.get("k").expect("get").as_deref(), Some("v"));
        backend.delete("k").expect("delete");
        backend.delete("k").expect("deleting twice is fine");
        assert_eq!(backend.get("k").expect("get"), None);
    }

    #[test]
    fn push_front_puts_newest_first() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.list_push_front("l", "a").expect("push"), 1);
        assert_eq!(backend.list_push_front("l", "b").expect("push"), 2);
        assert_eq!(backend.list_range("l", 0, -1).expect("range"), vec!["b", "a"]);
        assert_eq!(backend.list_index("l", 0).expect("index").as_deref(), Some("b"));
        assert_eq!(backend.list_index("l", -1).expect("index").as_deref(), Some("a"));
        assert_eq!(backend.list_index("l", 2).expect("index"), None);
    }

    #[test]
    fn range_clamps_past_the_end() {
        let backend = filled("l", &["a", "b", "c"]);
        assert_eq!(backend.list_range("l", 0, 3).expect("range"), vec!["a", "b", "c"]);
        assert_eq!(backend.list_range("l", 1, 100).expect("range"), vec!["b", "c"]);
        assert!(backend.list_range("l", 3, 5).expect("range").is_empty());
        assert!(backend.list_range("missing", 0, -1).expect("range").is_empty());
        assert!(backend.list_range("l", 2, 1).expect("range").is_empty());
    }

    #[test]
    fn trim_keeps_closed_range() {
        let backend = filled("l", &["a", "b", "c", "d"]);
        backend.list_trim("l", 0, 1).expect("trim");
        assert_eq!(backend.list_range("l", 0, -1).expect("range"), vec!["a", "b"]);
        assert_eq!(backend.list_len("l").expect("len"), 2);
    }

    #[test]
    fn trim_to_nothing_removes_key() {
        let backend = filled("l", &["a"]);
        backend.list_trim("l", 1, 0).expect("trim");
        assert!(backend.keys_by_prefix("").expect("keys").is_empty());
        assert_eq!(backend.list_len("l").expect("len"), 0);
    }

    #[test]
    fn list_ops_reject_scalars() {
        let backend = MemoryBackend::new();
        backend.set("s", "v").expect("set");
        assert!(matches!(backend.list_push_front("s", "x"), Err(BackendError::WrongType(_))));
        assert!(matches!(backend.list_len("s"), Err(BackendError::WrongType(_))));
        assert!(matches!(filled("l", &["a"]).get("l"), Err(BackendError::WrongType(_))));
    }

    #[test]
    fn prefix_enumeration_is_literal() {
        let backend = MemoryBackend::new();
        backend.set("bucket:a", "1").expect("set");
        backend.set("bucket:b", "1").expect("set");
        backend.set("bucketx", "1").expect("set");
        backend.set("tag:a", "1").expect("set");
        assert_eq!(
            backend.keys_by_prefix("bucket:").expect("keys"),
            vec!["bucket:a", "bucket:b"]
        );
    }

    #[test]
    fn batch_replies_follow_op_order() {
        let backend = filled("l", &["a", "b", "c"]);
        let replies = backend
            .execute_atomic(&[
                Op::index("l", 2),
                Op::push_front("l", "new"),
                Op::set("content", "blob"),
                Op::trim("l", 0, 2),
                Op::length("l"),
            ])
            .expect("batch");
        assert_eq!(
            replies,
            vec![
                Reply::Value("c".into()),
                Reply::Integer(4),
                Reply::Ok,
                Reply::Ok,
                Reply::Integer(3),
            ]
        );
        assert_eq!(backend.list_range("l", 0, -1).expect("range"), vec!["new", "a", "b"]);
    }

    #[test]
    fn failed_batch_leaves_no_trace() {
        let backend = filled("l", &["a"]);
        backend.set("s", "scalar").expect("set");
        let result = backend.execute_atomic(&[
            Op::push_front("l", "b"),
            Op::set("fresh", "v"),
            Op::push_front("s", "boom"),
        ]);
        assert!(matches!(result, Err(BackendError::WrongType(_))));
        assert_eq!(backend.list_range("l", 0, -1).expect("range"), vec!["a"]);
        assert_eq!(backend.get("fresh").expect("get"), None);
        assert_eq!(backend.get("s").expect("get").as_deref(), Some("scalar"));
    }
}
