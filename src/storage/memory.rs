use async_trait::async_trait;
use axum::body::Bytes;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use super::{ObjectBody, ObjectStore, StorageError};

/// In-process object store for tests and `--memory` servers, with hooks for
/// injecting delete failures.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    stuck_keys: RwLock<HashSet<String>>,
    failing_requests: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, key: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.objects.write().await.insert(key.into(), body.into());
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// The next `count` delete requests fail outright.
    pub fn fail_next_deletes(&self, count: usize) {
        self.failing_requests.store(count, Ordering::SeqCst);
    }

    /// `key` is reported as not deleted by every delete request.
    pub async fn stick(&self, key: impl Into<String>) {
        self.stuck_keys.write().await.insert(key.into());
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn presigned(key: &str, method: &str, ttl: Duration) -> String {
        format!("memory://{}?method={}&expires={}", key, method, ttl.as_secs())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn presign_put(&self, key: &str, _content_type: &str, ttl: Duration) -> Result<String, StorageError> {
        Ok(Self::presigned(key, "PUT", ttl))
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        Ok(Self::presigned(key, "GET", ttl))
    }

    async fn open(&self, key: &str) -> Result<ObjectBody, StorageError> {
        let data = self
            .objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(ObjectBody {
            content_length: data.len() as u64,
            stream: stream::iter([Ok(Bytes::from(data))]).boxed(),
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .objects
            .read()
            .await
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn delete_batch(&self, keys: &[String]) -> Result<Vec<String>, StorageError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing_requests
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(StorageError::Request("injected delete failure".to_string()));
        }

        let stuck = self.stuck_keys.read().await;
        let mut objects = self.objects.write().await;
        let mut failed = Vec::new();
        for key in keys {
            if stuck.contains(key) {
                failed.push(key.clone());
            } else {
                // Deleting a missing key succeeds, as in S3
                objects.remove(key);
            }
        }
        Ok(failed)
    }
}
