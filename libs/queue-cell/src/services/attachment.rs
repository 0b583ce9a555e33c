use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::{
    AttachmentLocation, AttachmentPayload, AttachmentUpload,
    EmergencyAttachment, QueueError,
};

/// Keeps uploaded emergency documents somewhere and returns what the queue entry should record.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn store(&self, doctor_id: &str, upload: AttachmentUpload) -> Result<EmergencyAttachment, QueueError>;

    /// Remove a stored attachment whose queue entry was never written.
    async fn discard(&self, _attachment: &EmergencyAttachment) -> Result<(), QueueError> {
        Ok(())
    }
}

/// Uploads to a Supabase Storage bucket; the queue entry keeps only the URL.
pub struct SupabaseAttachmentStore {
    supabase: SupabaseClient,
    bucket: String,
}

impl SupabaseAttachmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            bucket: config.attachment_bucket.clone(),
        }
    }
}

#[async_trait]
impl AttachmentStore for SupabaseAttachmentStore {
    async fn store(&self, doctor_id: &str, upload: AttachmentUpload) -> Result<EmergencyAttachment, QueueError> {
        let object_path = format!(
            "{}/{}-{}",
            urlencoding::encode(doctor_id),
            Uuid::new_v4(),
            urlencoding::encode(&upload.filename)
        );
        debug!("Uploading emergency document to bucket {}", self.bucket);

        let storage_path = self.supabase
            .upload_object(&self.bucket, &object_path, upload.bytes, &upload.mime_type)
            .await
            .map_err(|e| QueueError::AttachmentError(e.to_string()))?;

        Ok(EmergencyAttachment {
            filename: upload.filename,
            mime_type: upload.mime_type,
            size: upload.size,
            location: AttachmentLocation::Remote {
                url: self.supabase.get_public_url(&self.bucket, &storage_path),
                storage_path,
            },
        })
    }

    async fn discard(&self, attachment: &EmergencyAttachment) -> Result<(), QueueError> {
        let AttachmentLocation::Remote { storage_path, .. } = &attachment.location else {
            return Ok(());
        };
        debug!("Removing unreferenced document {} from bucket {}", storage_path, self.bucket);

        self.supabase
            .delete_object(&self.bucket, storage_path)
            .await
            .map_err(|e| QueueError::AttachmentError(e.to_string()))
    }
}

/// Embeds the file as a `data:` URL in the queue document. Only suitable for small files
/// and deployments without a storage bucket.
pub struct InlineAttachmentStore;

#[async_trait]
impl AttachmentStore for InlineAttachmentStore {
    async fn store(&self, _doctor_id: &str, upload: AttachmentUpload) -> Result<EmergencyAttachment, QueueError> {
        let data_url = format!("data:{};base64,{}", upload.mime_type, BASE64.encode(&upload.bytes));

        Ok(EmergencyAttachment {
            filename: upload.filename,
            mime_type: upload.mime_type,
            size: upload.size,
            location: AttachmentLocation::Inline { data_url },
        })
    }
}

impl AttachmentPayload {
    /// Decode a JSON-submitted attachment. `data` may be bare base64 or a `data:` URL,
    /// in which case its media type is used when `mime_type` is absent.
    pub fn decode(self) -> Result<AttachmentUpload, QueueError> {
        let (url_mime, encoded) = match self.data.split_once(";base64,") {
            Some((prefix, body)) => (prefix.strip_prefix("data:").map(str::to_string), body),
            None => (None, self.data.as_str()),
        };

        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| QueueError::ValidationError(format!("Attachment is not valid base64: {}", e)))?;

        let mut upload = AttachmentUpload::new(self.filename, self.mime_type.or(url_mime), bytes);
        if let Some(declared) = self.size {
            upload.size = declared;
        }
        Ok(upload)
    }
}
