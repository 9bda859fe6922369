//! Redis cache backend.
//!
//! Reads go through a shared multiplexed connection; the commit path opens
//! its own connection because WATCH state is per-connection.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, error, info, warn};

use super::{
    fingerprint, CacheError, CacheRepository, PendingWrite, COMMIT_RETRIES, PENDING_CAPACITY,
};

pub struct RedisCache {
    client: redis::Client,
    connection: ConnectionManager,
    pending: Mutex<VecDeque<PendingWrite>>,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(CacheError::from)?;
        let connection = ConnectionManager::new(client.clone())
            .await
            .map_err(CacheError::from)?;
        info!(url, "connected to cache backend");
        Ok(Self {
            client,
            connection,
            pending: Mutex::new(VecDeque::new()),
        })
    }
}

#[async_trait]
impl CacheRepository for RedisCache {
    async fn get(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        let id = fingerprint(namespace, key).to_string();
        let mut connection = self.connection.clone();
        match redis::cmd("GET")
            .arg(&id)
            .query_async::<Option<Vec<u8>>>(&mut connection)
            .await
        {
            Ok(Some(value)) => {
                debug!(namespace, key = %id, "cache hit");
                Some(value)
            }
            Ok(None) => {
                debug!(namespace, key = %id, "cache miss");
                None
            }
            Err(err) => {
                // Misses never block request processing; a broken backend
                // degrades to fetch-every-time.
                error!(namespace, %err, "cache read failed");
                None
            }
        }
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

    async fn commit(&self, watch_key: &str) -> Result<(), CacheError> {
        let drained: Vec<PendingWrite> = {
            let mut pending = self.pending.lock().expect("cache queue poisoned");
            pending.drain(..).collect()
        };
        if drained.is_empty() {
            return Ok(());
        }

        let watch_id = fingerprint("watchKey", watch_key).to_string();
        for _ in 0..COMMIT_RETRIES {
            let mut connection = self
                .client
                .get_multiplexed_async_connection()
                .await
                .map_err(CacheError::from)?;

            redis::cmd("WATCH")
                .arg(&watch_id)
                .query_async::<()>(&mut connection)
                .await
                .map_err(CacheError::from)?;

            let mut pipeline = redis::pipe();
            pipeline.atomic();
            for write in &drained {
                pipeline
                    .cmd("SET")
                    .arg(write.key.to_string())
                    .arg(&write.value)
                    .arg("NX")
                    .arg("EX")
                    .arg(write.ttl.as_secs().max(1))
                    .ignore();
            }

            match pipeline
                .query_async::<Option<redis::Value>>(&mut connection)
                .await
            {
                // Nil EXEC means the watched key changed under us.
                Ok(None) => continue,
                Ok(Some(_)) => {
                    for write in &drained {
                        info!(namespace = %write.namespace, key = %write.key, "cached upstream response");
                    }
                    return Ok(());
                }
                Err(err) => return Err(CacheError::from(err)),
            }
        }
        Err(CacheError::CommitConflict(COMMIT_RETRIES))
    }
}
