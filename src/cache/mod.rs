//! Fingerprint-keyed upstream response cache.
//!
//! Writes are buffered on a bounded queue and flushed in one optimistic
//! commit after the client response has been streamed. Caching is
//! best-effort: a full queue drops the oldest pending write and a failed
//! commit is logged, never surfaced.

mod memory;
mod redis_store;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryCache;
pub use redis_store::RedisCache;

/// Pending writes beyond this are dropped oldest-first.
pub const PENDING_CAPACITY: usize = 50;

/// Optimistic-commit retries on conflict.
pub const COMMIT_RETRIES: usize = 2;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("optimistic commit exhausted {0} retries")]
    CommitConflict(usize),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// Stable 128-bit cache key: a namespace-salted MD5 UUID of the lookup key.
/// Pure in its inputs, so the same (namespace, key) pair fingerprints
/// identically across processes.
pub fn fingerprint(namespace: &str, key: &str) -> Uuid {
    let namespace_id = Uuid::new_v3(&Uuid::NAMESPACE_OID, namespace.as_bytes());
    Uuid::new_v3(&namespace_id, key.as_bytes())
}

#[derive(Debug, Clone)]
pub(crate) struct PendingWrite {
    pub namespace: String,
    pub key: Uuid,
    pub value: Vec<u8>,
    pub ttl: Duration,
}

#[async_trait]
pub trait CacheRepository: Send + Sync {
    /// Read-through lookup. A miss (or any backend failure) returns `None`.
    async fn get(&self, namespace: &str, key: &str) -> Option<Vec<u8>>;

    /// Buffers a write without blocking; drops the oldest entry when full.
    fn enqueue(&self, namespace: &str, key: &str, value: Vec<u8>, ttl: Duration);

    /// Drains the buffer into the backing store in one optimistic
    /// transaction watching `watch_key`'s fingerprint. Existing entries are
    /// never overwritten.
    async fn commit(&self, watch_key: &str) -> Result<(), CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_pure() {
        let a = fingerprint("msc schedule", "https://example.com/a?x=1");
        let b = fingerprint("msc schedule", "https://example.com/a?x=1");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_separates_namespaces_and_keys() {
        let base = fingerprint("msc schedule", "k");
        assert_ne!(base, fingerprint("zim schedule", "k"));
        assert_ne!(base, fingerprint("msc schedule", "k2"));
    }

    #[test]
    fn fingerprint_is_md5_uuid() {
        assert_eq!(fingerprint("a", "b").get_version_num(), 3);
    }
}
