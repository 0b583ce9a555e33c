use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use queue_cell::*;
use shared_utils::crypto::{AesGcmCipher, DisabledCipher, FieldCipher};
use shared_utils::test_utils::TEST_ENCRYPTION_KEY;

/// Builders for queue services wired to in-memory collaborators
pub struct QueueTestUtils;

impl QueueTestUtils {
    pub fn cipher() -> Arc<dyn FieldCipher> {
        Arc::new(AesGcmCipher::from_base64_key(TEST_ENCRYPTION_KEY).expect("test key is valid"))
    }

    pub fn service_with_store(store: Arc<dyn QueueStore>) -> QueueService {
        QueueService::new(
            store,
            Arc::new(KeywordClassifier::default()),
            Self::cipher(),
            Arc::new(InlineAttachmentStore),
        )
    }

    /// Service plus a handle on its store for direct inspection
    pub fn service() -> (QueueService, Arc<InMemoryQueueStore>) {
        let store = Arc::new(InMemoryQueueStore::new());
        (Self::service_with_store(store.clone()), store)
    }

    pub fn service_without_encryption() -> (QueueService, Arc<InMemoryQueueStore>) {
        let store = Arc::new(InMemoryQueueStore::new());
        let service = QueueService::new(
            store.clone(),
            Arc::new(KeywordClassifier::default()),
            Arc::new(DisabledCipher),
            Arc::new(InlineAttachmentStore),
        );
        (service, store)
    }

    pub fn normal_request(doctor_id: &str, patient_name: &str) -> EnqueueRequest {
        EnqueueRequest {
            doctor_id: doctor_id.to_string(),
            patient_name: patient_name.to_string(),
            mobile_number: Some("9876543210".to_string()),
            ..EnqueueRequest::default()
        }
    }

    pub fn emergency_request(doctor_id: &str, patient_name: &str, reason: &str) -> EnqueueRequest {
        EnqueueRequest {
            emergency: true,
            emergency_reason: Some(reason.to_string()),
            emergency_type: Some("trauma".to_string()),
            ..Self::normal_request(doctor_id, patient_name)
        }
    }
}

/// Rejects the first `conflicts` conditional writes as if another writer got there first
pub struct ContendedStore {
    inner: InMemoryQueueStore,
    remaining_conflicts: AtomicU32,
    pub cas_calls: AtomicU32,
}

impl ContendedStore {
    pub fn new(conflicts: u32) -> Self {
        Self {
            inner: InMemoryQueueStore::new(),
            remaining_conflicts: AtomicU32::new(conflicts),
            cas_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl QueueStore for ContendedStore {
    async fn load(&self, doctor_id: &str) -> Result<Option<QueueDocument>, QueueError> {
        self.inner.load(doctor_id).await
    }

    async fn compare_and_swap(&self, document: &QueueDocument, expected_version: u64) -> Result<bool, QueueError> {
        self.cas_calls.fetch_add(1, Ordering::SeqCst);

        let conflicted = self.remaining_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if conflicted {
            return Ok(false);
        }

        self.inner.compare_and_swap(document, expected_version).await
    }
}

/// Every call fails as if the backing server were down
pub struct UnavailableStore;

#[async_trait]
impl QueueStore for UnavailableStore {
    async fn load(&self, _doctor_id: &str) -> Result<Option<QueueDocument>, QueueError> {
        Err(QueueError::StoreUnavailable("connection refused".to_string()))
    }

    async fn compare_and_swap(&self, _document: &QueueDocument, _expected_version: u64) -> Result<bool, QueueError> {
        Err(QueueError::StoreUnavailable("connection refused".to_string()))
    }
}

mod attachment_test;
mod redis_store_test;
