use std::sync::Arc;

use tokio::sync::Mutex;

use assert_matches::assert_matches;
use async_trait::async_trait;
use serde_json::json;
use wiremock::{
    matchers::{header, method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};

use queue_cell::*;
use shared_utils::test_utils::TestConfig;
use super::{ContendedStore, QueueTestUtils};

fn scan_upload() -> AttachmentUpload {
    AttachmentUpload::new(Some("x-ray scan.png".into()), Some("image/png".into()), b"png-bytes".to_vec())
}

#[tokio::test]
async fn test_supabase_store_uploads_to_bucket() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/object/emergency-documents/DR-1/[0-9a-f-]{36}-x-ray%20scan\.png$"))
        .and(header("apikey", "test-anon-key"))
        .and(header("content-type", "image/png"))
        .and(header("x-upsert", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Key": "emergency-documents/DR-1/scan"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let store = SupabaseAttachmentStore::new(&config);

    let attachment = store.store("DR-1", scan_upload()).await.expect("Upload should succeed");

    assert_eq!(attachment.filename, "x-ray scan.png");
    assert_eq!(attachment.size, 9);
    assert_matches!(
        attachment.location,
        AttachmentLocation::Remote { url, storage_path } => {
            assert!(storage_path.starts_with("DR-1/"));
            assert_eq!(
                url,
                format!("{}/storage/v1/object/public/emergency-documents/{}", mock_server.uri(), storage_path)
            );
        }
    );
}

#[tokio::test]
async fn test_supabase_store_reports_upload_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/object/.*$"))
        .respond_with(ResponseTemplate::new(500).set_body_string("storage down"))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let store = SupabaseAttachmentStore::new(&config);

    let result = store.store("DR-1", scan_upload()).await;
    assert_matches!(result, Err(QueueError::AttachmentError(msg)) if msg.contains("storage down"));
}

#[tokio::test]
async fn test_enqueue_records_remote_attachment() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/object/emergency-documents/.*$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let service = QueueService::new(
        Arc::new(InMemoryQueueStore::new()),
        Arc::new(KeywordClassifier::default()),
        QueueTestUtils::cipher(),
        Arc::new(SupabaseAttachmentStore::new(&config)),
    );

    let ticket = service
        .enqueue(QueueTestUtils::emergency_request("DR-1", "Alice", "fracture"), Some(scan_upload()))
        .await
        .unwrap();

    let view = service.get_queue("DR-1").await.unwrap();
    let stored = view.queue.emergency_queue[0].emergency_attachment.clone().expect("Attachment kept");
    assert_eq!(Some(stored), ticket.emergency_attachment);
    assert_matches!(view.queue.emergency_queue[0].emergency_attachment.as_ref().map(|a| &a.location), Some(AttachmentLocation::Remote { .. }));
}

struct BrokenAttachmentStore;

#[async_trait]
impl AttachmentStore for BrokenAttachmentStore {
    async fn store(&self, _doctor_id: &str, _upload: AttachmentUpload) -> Result<EmergencyAttachment, QueueError> {
        Err(QueueError::AttachmentError("bucket missing".to_string()))
    }
}

#[tokio::test]
async fn test_failed_attachment_does_not_block_enqueue() {
    let service = QueueService::new(
        Arc::new(InMemoryQueueStore::new()),
        Arc::new(KeywordClassifier::default()),
        QueueTestUtils::cipher(),
        Arc::new(BrokenAttachmentStore),
    );

    let ticket = service
        .enqueue(QueueTestUtils::emergency_request("DR-1", "Alice", "accident"), Some(scan_upload()))
        .await
        .expect("Enqueue should still succeed");

    assert!(ticket.emergency_attachment.is_none());
    assert_eq!(service.get_queue("DR-1").await.unwrap().emergency_count, 1);
}

/// Keeps documents in memory and remembers which ones were discarded again
#[derive(Default)]
struct RecordingAttachmentStore {
    discarded: Mutex<Vec<String>>,
    fail_discard: bool,
}

#[async_trait]
impl AttachmentStore for RecordingAttachmentStore {
    async fn store(&self, doctor_id: &str, upload: AttachmentUpload) -> Result<EmergencyAttachment, QueueError> {
        let storage_path = format!("{}/{}", doctor_id, upload.filename);
        Ok(EmergencyAttachment {
            filename: upload.filename,
            mime_type: upload.mime_type,
            size: upload.size,
            location: AttachmentLocation::Remote {
                url: format!("https://storage.test/{}", storage_path),
                storage_path,
            },
        })
    }

    async fn discard(&self, attachment: &EmergencyAttachment) -> Result<(), QueueError> {
        if let AttachmentLocation::Remote { storage_path, .. } = &attachment.location {
            self.discarded.lock().await.push(storage_path.clone());
        }
        if self.fail_discard {
            return Err(QueueError::AttachmentError("delete refused".to_string()));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_lost_write_discards_uploaded_document() {
    let attachments = Arc::new(RecordingAttachmentStore::default());
    let service = QueueService::new(
        Arc::new(ContendedStore::new(u32::MAX)),
        Arc::new(KeywordClassifier::default()),
        QueueTestUtils::cipher(),
        attachments.clone(),
    )
    .with_max_cas_retries(3);

    let result = service
        .enqueue(QueueTestUtils::emergency_request("DR-1", "Alice", "accident"), Some(scan_upload()))
        .await;

    assert_matches!(result, Err(QueueError::ConcurrentModification { .. }));
    assert_eq!(*attachments.discarded.lock().await, vec!["DR-1/x-ray scan.png".to_string()]);
}

#[tokio::test]
async fn test_failed_discard_still_returns_the_write_error() {
    let attachments = Arc::new(RecordingAttachmentStore { fail_discard: true, ..Default::default() });
    let service = QueueService::new(
        Arc::new(ContendedStore::new(u32::MAX)),
        Arc::new(KeywordClassifier::default()),
        QueueTestUtils::cipher(),
        attachments.clone(),
    )
    .with_max_cas_retries(1);

    let result = service
        .enqueue(QueueTestUtils::emergency_request("DR-1", "Alice", "accident"), Some(scan_upload()))
        .await;

    assert_matches!(result, Err(QueueError::ConcurrentModification { .. }));
    assert_eq!(attachments.discarded.lock().await.len(), 1);
}

#[tokio::test]
async fn test_successful_enqueue_keeps_the_document() {
    let attachments = Arc::new(RecordingAttachmentStore::default());
    let service = QueueService::new(
        Arc::new(InMemoryQueueStore::new()),
        Arc::new(KeywordClassifier::default()),
        QueueTestUtils::cipher(),
        attachments.clone(),
    );

    service
        .enqueue(QueueTestUtils::emergency_request("DR-1", "Alice", "accident"), Some(scan_upload()))
        .await
        .unwrap();

    assert!(attachments.discarded.lock().await.is_empty());
}

#[tokio::test]
async fn test_supabase_store_deletes_discarded_objects() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/storage/v1/object/emergency-documents/DR-1/abc-scan.png"))
        .and(header("apikey", "test-anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Successfully deleted"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let store = SupabaseAttachmentStore::new(&config);
    let attachment = EmergencyAttachment {
        filename: "scan.png".to_string(),
        mime_type: "image/png".to_string(),
        size: 9,
        location: AttachmentLocation::Remote {
            url: format!("{}/storage/v1/object/public/emergency-documents/DR-1/abc-scan.png", mock_server.uri()),
            storage_path: "DR-1/abc-scan.png".to_string(),
        },
    };

    assert!(store.discard(&attachment).await.is_ok());
}
