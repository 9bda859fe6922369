//! In-process cache backend.
//!
//! Same contract as the redis backend, used when no cache host is
//! configured and throughout the test suite.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::warn;
use uuid::Uuid;

use super::{fingerprint, CacheError, CacheRepository, PendingWrite, PENDING_CAPACITY};

#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<Uuid, (Vec<u8>, Instant)>,
    pending: Mutex<VecDeque<PendingWrite>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries currently committed (expired ones excluded).
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.value().1 > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheRepository for MemoryCache {
    async fn get(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        let id = fingerprint(namespace, key);
        let entry = self.entries.get(&id)?;
        let (value, expires_at) = entry.value();
        if *expires_at <= Instant::now() {
            drop(entry);
            self.entries.remove(&id);
            return None;
        }
        Some(value.clone())
    }

    fn enqueue(&self, namespace: &str, key: &str, value: Vec<u8>, ttl: Duration) {
        let mut pending = self.pending.lock().expect("cache queue poisoned");
        if pending.len() >= PENDING_CAPACITY {
            warn!(key, "cache queue full, dropping oldest pending write");
            pending.pop_front();
        }
        pending.push_back(PendingWrite {
            namespace: namespace.to_string(),
            key: fingerprint(namespace, key),
            value,
            ttl,
        });
    }

    async fn commit(&self, _watch_key: &str) -> Result<(), CacheError> {
        let drained: Vec<PendingWrite> = {
            let mut pending = self.pending.lock().expect("cache queue poisoned");
            pending.drain(..).collect()
        };
        let now = Instant::now();
        for write in drained {
            // First write wins, matching the SetNX semantics of the backend.
            self.entries
                .entry(write.key)
                .or_insert_with(|| (write.value, now + write.ttl));
        }
        Ok(())
    }
}
