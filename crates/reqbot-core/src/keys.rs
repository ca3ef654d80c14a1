//! Key namespace shared by every store.

use crate::id::{RequestId, ResponseId};

/// Prefix of per-bucket index lists.
pub const BUCKET_PREFIX: &str = "bucket:";
/// Prefix of captured request blobs.
pub const REQUEST_PREFIX: &str = "request:";
/// Prefix of stored response blobs.
pub const RESPONSE_PREFIX: &str = "response:";
/// Prefix of per-tag index lists.
pub const TAG_PREFIX: &str = "tag:";
/// Tag recorded for responses saved without any tags.
pub const NO_TAGS: &str = "none";

/// Index list of a bucket.
#[must_use]
pub fn bucket_key(bucket: &str) -> String {
    format!("{BUCKET_PREFIX}{bucket}")
}

/// Content key of a captured request.
#[must_use]
pub fn request_key(id: RequestId) -> String {
    format!("{REQUEST_PREFIX}{id}")
}

/// Content key of a captured request whose id is only known as text.
#[must_use]
pub fn request_key_raw(id: &str) -> String {
    format!("{REQUEST_PREFIX}{id}")
}

/// Content key of a stored response.
#[must_use]
pub fn response_key(id: ResponseId) -> String {
    format!("{RESPONSE_PREFIX}{id}")
}

/// Index list of a tag.
#[must_use]
pub fn tag_key(tag: &str) -> String {
    format!("{TAG_PREFIX}{tag}")
}

/// Strip `prefix` from every key, then sort and deduplicate the remainder.
///
/// Keys not carrying the prefix are ignored.
#[must_use]
pub fn names_under<I>(prefix: &str, keys: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut names: Vec<String> = keys
        .into_iter()
        .filter_map(|key| key.strip_prefix(prefix).map(str::to_owned))
        .collect();
    names.sort();
    names.dedup();
    names
}
