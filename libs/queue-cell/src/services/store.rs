use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{QueueDocument, QueueError};

/// Persistence for per-doctor queue documents.
///
/// Writers load a document, change it, and hand it back together with the
/// version they loaded. The store only accepts the write if nobody else has
/// written in between; a missing document counts as version 0.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn load(&self, doctor_id: &str) -> Result<Option<QueueDocument>, QueueError>;

    /// Returns `false` when the stored version no longer matches `expected_version`.
    async fn compare_and_swap(&self, document: &QueueDocument, expected_version: u64) -> Result<bool, QueueError>;
}

#[derive(Default)]
pub struct InMemoryQueueStore {
    documents: RwLock<HashMap<String, QueueDocument>>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn document_count(&self) -> usize {
        self.documents.read().await.len()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn load(&self, doctor_id: &str) -> Result<Option<QueueDocument>, QueueError> {
        Ok(self.documents.read().await.get(doctor_id).cloned())
    }

    async fn compare_and_swap(&self, document: &QueueDocument, expected_version: u64) -> Result<bool, QueueError> {
        let mut documents = self.documents.write().await;

        let stored_version = documents.get(&document.doctor_id).map_or(0, |d| d.version);
        if stored_version != expected_version {
            debug!(
                "Version mismatch for doctor {}: stored {}, expected {}",
                document.doctor_id, stored_version, expected_version
            );
            return Ok(false);
        }

        documents.insert(document.doctor_id.clone(), document.clone());
        Ok(true)
    }
}
