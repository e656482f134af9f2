use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::ObjectStore;
use crate::config::StorageConfig;

/// Outcome of a storage sweep
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
    /// Keys still present after every retry
    pub failed: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.errors.is_empty()
    }

    pub fn merge(&mut self, other: CleanupReport) {
        self.deleted += other.deleted;
        self.failed.extend(other.failed);
        self.errors.extend(other.errors);
    }

    /// Human-readable warnings for API responses
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = self.errors.clone();
        if !self.failed.is_empty() {
            warnings.push(format!(
                "{} stored object(s) could not be deleted: {}",
                self.failed.len(),
                self.failed.join(", ")
            ));
        }
        warnings
    }
}

/// Batched, retrying deletion on top of an `ObjectStore`.
#[derive(Clone)]
pub struct ObjectCleaner {
    store: Arc<dyn ObjectStore>,
    batch_size: usize,
    attempts: u32,
    backoff: Duration,
}

impl ObjectCleaner {
    pub fn new(store: Arc<dyn ObjectStore>, config: &StorageConfig) -> Self {
        Self {
            store,
            batch_size: config.delete_batch_size.clamp(1, 1000),
            attempts: config.delete_attempts.max(1),
            backoff: Duration::from_millis(config.delete_backoff_ms),
        }
    }

    /// Delete every object under `prefix`.
    pub async fn cleanup_prefix(&self, prefix: &str) -> CleanupReport {
        let keys = match self.store.list(prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Could not list objects under {}: {}", prefix, e);
                return CleanupReport {
                    errors: vec![format!("Could not list objects under {}: {}", prefix, e)],
                    ..Default::default()
                };
            }
        };

        let report = self.cleanup_keys(&keys).await;
        info!(
            "Cleaned up {}: {} deleted, {} failed",
            prefix,
            report.deleted,
            report.failed.len()
        );
        report
    }

    /// Delete an explicit set of keys. Duplicates are removed first.
    pub async fn cleanup_keys(&self, keys: &[String]) -> CleanupReport {
        let unique: Vec<String> = keys.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();

        let mut report = CleanupReport::default();
        for batch in unique.chunks(self.batch_size) {
            report.merge(self.delete_with_retry(batch.to_vec()).await);
        }
        report
    }

    async fn delete_with_retry(&self, mut pending: Vec<String>) -> CleanupReport {
        let mut report = CleanupReport::default();
        let mut last_error = None;

        for attempt in 1..=self.attempts {
            if attempt > 1 {
                tokio::time::sleep(self.backoff * (attempt - 1)).await;
            }

            match self.store.delete_batch(&pending).await {
                Ok(failed) => {
                    report.deleted += pending.len() - failed.len();
                    pending = failed;
                    last_error = None;
                }
                Err(e) => {
                    warn!(
                        "Delete of {} objects failed (attempt {}/{}): {}",
                        pending.len(),
                        attempt,
                        self.attempts,
                        e
                    );
                    last_error = Some(e.to_string());
                }
            }

            if pending.is_empty() {
                return report;
            }
        }

        warn!("Giving up on {} objects after {} attempts", pending.len(), self.attempts);
        report.errors.extend(last_error);
        report.failed = pending;
        report
    }
}
