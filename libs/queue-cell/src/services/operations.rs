use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use shared_config::{AppConfig, QueueBackend, DEFAULT_MAX_ATTACHMENT_BYTES, DEFAULT_QUEUE_MAX_CAS_RETRIES};
use shared_utils::crypto::{cipher_from_config, FieldCipher};

use crate::{
    AttachmentLocation, AttachmentStore, AttachmentUpload, CurrentEmergency, EmergencyAttachment, EmergencyClassifier, EnqueueRequest,
    EntryType, InMemoryQueueStore, InlineAttachmentStore, KeywordClassifier, QueueDocument,
    QueueEntry, QueueError, QueueStore, QueueView, RedisQueueStore, SupabaseAttachmentStore,
    truncate_reason,
};

/// Outcome of one read-modify-write attempt.
enum Mutation<T> {
    Write(QueueDocument, T),
    Skip(T),
}

/// Queue state transitions for every doctor: enqueue, emergency start/resolve and normal dequeue.
pub struct QueueService {
    store: Arc<dyn QueueStore>,
    classifier: Arc<dyn EmergencyClassifier>,
    cipher: Arc<dyn FieldCipher>,
    attachments: Arc<dyn AttachmentStore>,
    max_cas_retries: u32,
    max_attachment_bytes: usize,
}

impl QueueService {
    pub fn new(
        store: Arc<dyn QueueStore>,
        classifier: Arc<dyn EmergencyClassifier>,
        cipher: Arc<dyn FieldCipher>,
        attachments: Arc<dyn AttachmentStore>,
    ) -> Self {
        Self {
            store,
            classifier,
            cipher,
            attachments,
            max_cas_retries: DEFAULT_QUEUE_MAX_CAS_RETRIES,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }

    /// Wire the service from configuration: Redis or in-memory store, Supabase Storage for
    /// attachments when Supabase is configured, AES-GCM when a key is present.
    pub async fn from_config(config: &AppConfig) -> Result<Self, QueueError> {
        let store: Arc<dyn QueueStore> = match config.queue_backend {
            QueueBackend::Redis => Arc::new(RedisQueueStore::new(config).await?),
            QueueBackend::Memory => {
                warn!("Using in-memory queue store; queues are lost on restart");
                Arc::new(InMemoryQueueStore::new())
            }
        };

        let attachments: Arc<dyn AttachmentStore> = if config.is_configured() {
            Arc::new(SupabaseAttachmentStore::new(config))
        } else {
            warn!("Supabase not configured, emergency documents will be stored inline");
            Arc::new(InlineAttachmentStore)
        };

        Ok(Self::new(
            store,
            Arc::new(KeywordClassifier::default()),
            cipher_from_config(config),
            attachments,
        )
        .with_max_cas_retries(config.queue_max_cas_retries)
        .with_max_attachment_bytes(config.max_attachment_bytes))
    }

    pub fn with_max_cas_retries(mut self, retries: u32) -> Self {
        self.max_cas_retries = retries;
        self
    }

    pub fn with_max_attachment_bytes(mut self, bytes: usize) -> Self {
        self.max_attachment_bytes = bytes;
        self
    }

    pub fn max_attachment_bytes(&self) -> usize {
        self.max_attachment_bytes
    }

    /// Current queue for a doctor, or an empty skeleton if nothing was ever queued.
    /// Emergency reasons are decrypted for display.
    pub async fn get_queue(&self, doctor_id: &str) -> Result<QueueView, QueueError> {
        let doctor_id = require(doctor_id, "doctorId")?;

        let mut document = self.store.load(doctor_id).await?
            .unwrap_or_else(|| QueueDocument::empty(doctor_id));

        for entry in document.emergency_queue.iter_mut() {
            self.reveal_reason(entry);
        }

        Ok(QueueView::new(document))
    }

    pub async fn enqueue(
        &self,
        request: EnqueueRequest,
        upload: Option<AttachmentUpload>,
    ) -> Result<QueueEntry, QueueError> {
        let doctor_id = require(&request.doctor_id, "doctorId")?.to_string();
        let patient_name = require(&request.patient_name, "patientName")?.to_string();

        let now = Utc::now();
        let entry_type = if request.emergency { EntryType::Emergency } else { EntryType::Normal };

        let mut entry = QueueEntry {
            ticket_id: generate_ticket_id(&doctor_id, now),
            patient_name,
            patient_id: request.patient_id,
            mobile_number: request.mobile_number,
            entry_type,
            emergency_reason: None,
            emergency_reason_encrypted: false,
            emergency_verified: false,
            emergency_attachment: None,
            age: request.age,
            gender: request.gender,
            city: request.city,
            hospital_id: request.hospital_id,
            hospital_name: request.hospital_name,
            emergency_type: request.emergency_type,
            preferred_doctor_id: request.preferred_doctor_id,
            created_at: now,
        };

        if entry.is_emergency() {
            let reason = truncate_reason(request.emergency_reason.as_deref().unwrap_or(""));
            entry.emergency_verified = self.classifier.is_verified(&reason);

            match self.cipher.encrypt(&reason) {
                Ok(sealed) => {
                    entry.emergency_reason = Some(sealed);
                    entry.emergency_reason_encrypted = true;
                }
                Err(e) => {
                    warn!("Storing emergency reason unencrypted for doctor {}: {}", doctor_id, e);
                    entry.emergency_reason = Some(reason);
                }
            }

            if let Some(upload) = upload {
                entry.emergency_attachment = self.store_attachment(&doctor_id, upload).await?;
            }
        }

        let written = self.mutate(&doctor_id, |existing| {
            let mut document = existing.unwrap_or_else(|| QueueDocument::empty(&doctor_id));
            let mut entry = entry.clone();
            entry.ticket_id = unique_ticket_id(&document, &entry.ticket_id);
            document.push(entry.clone());
            Ok(Mutation::Write(document, entry))
        })
        .await;

        let mut stored = match written {
            Ok(stored) => stored,
            Err(e) => {
                if let Some(attachment) = &entry.emergency_attachment {
                    self.discard_attachment(attachment).await;
                }
                return Err(e);
            }
        };
        self.reveal_reason(&mut stored);

        info!(
            "Enqueued ticket {} for doctor {} ({:?}, verified: {})",
            stored.ticket_id, doctor_id, stored.entry_type, stored.emergency_verified
        );
        Ok(stored)
    }

    /// Move the earliest pending emergency into `current_emergency`.
    pub async fn start_emergency(&self, doctor_id: &str) -> Result<CurrentEmergency, QueueError> {
        let doctor_id = require(doctor_id, "doctorId")?;

        let started = self.mutate(doctor_id, |existing| {
            let mut document = match existing {
                Some(doc) if !doc.emergency_queue.is_empty() => doc,
                _ => return Err(QueueError::PreconditionFailed("No emergency cases pending".to_string())),
            };

            if let Some(active) = &document.current_emergency {
                return Err(QueueError::Conflict(format!(
                    "Emergency already in progress (ticket {})",
                    active.ticket_id
                )));
            }

            let next = document.emergency_queue.remove(0);
            let current = CurrentEmergency {
                ticket_id: next.ticket_id,
                started_at: Utc::now(),
            };
            document.current_emergency = Some(current.clone());
            Ok(Mutation::Write(document, current))
        })
        .await?;

        info!("Doctor {} started emergency {}", doctor_id, started.ticket_id);
        Ok(started)
    }

    /// Clear the active emergency. Safe to repeat; returns what was cleared, if anything.
    pub async fn resolve_emergency(&self, doctor_id: &str) -> Result<Option<CurrentEmergency>, QueueError> {
        let doctor_id = require(doctor_id, "doctorId")?;

        let resolved = self.mutate(doctor_id, |existing| match existing {
            Some(mut document) => {
                let cleared = document.current_emergency.take();
                Ok(Mutation::Write(document, cleared))
            }
            None => Ok(Mutation::Skip(None)),
        })
        .await?;

        match &resolved {
            Some(emergency) => info!("Doctor {} resolved emergency {}", doctor_id, emergency.ticket_id),
            None => debug!("Doctor {} had no active emergency to resolve", doctor_id),
        }
        Ok(resolved)
    }

    /// Serve the head of the normal queue. Refused while any emergency is active or pending.
    pub async fn dequeue_normal(&self, doctor_id: &str) -> Result<QueueEntry, QueueError> {
        let doctor_id = require(doctor_id, "doctorId")?;

        let served = self.mutate(doctor_id, |existing| {
            if existing.as_ref().map_or(false, QueueDocument::is_busy_with_emergency) {
                return Err(QueueError::Conflict(
                    "Emergency in progress, normal queue is paused".to_string(),
                ));
            }

            let mut document = match existing {
                Some(doc) if !doc.normal_queue.is_empty() => doc,
                _ => return Err(QueueError::PreconditionFailed("No normal patients waiting".to_string())),
            };

            let next = document.normal_queue.remove(0);
            Ok(Mutation::Write(document, next))
        })
        .await?;

        info!("Doctor {} serving ticket {}", doctor_id, served.ticket_id);
        Ok(served)
    }

    /// Best effort; a failed delete leaves the object behind, so its path is logged.
    async fn discard_attachment(&self, attachment: &EmergencyAttachment) {
        if let Err(e) = self.attachments.discard(attachment).await {
            let path = match &attachment.location {
                AttachmentLocation::Remote { storage_path, .. } => storage_path.as_str(),
                AttachmentLocation::Inline { .. } => "inline",
            };
            warn!("Orphaned emergency document {} left in storage: {}", path, e);
        }
    }

    async fn store_attachment(
        &self,
        doctor_id: &str,
        upload: AttachmentUpload,
    ) -> Result<Option<EmergencyAttachment>, QueueError> {
        if upload.bytes.len() > self.max_attachment_bytes {
            return Err(QueueError::ValidationError(format!(
                "Attachment exceeds {} bytes",
                self.max_attachment_bytes
            )));
        }

        match self.attachments.store(doctor_id, upload).await {
            Ok(attachment) => Ok(Some(attachment)),
            Err(e) => {
                warn!("Dropping emergency attachment for doctor {}: {}", doctor_id, e);
                Ok(None)
            }
        }
    }

    fn reveal_reason(&self, entry: &mut QueueEntry) {
        if !entry.emergency_reason_encrypted {
            return;
        }

        if let Some(sealed) = entry.emergency_reason.as_deref() {
            match self.cipher.decrypt(sealed) {
                Ok(plain) => {
                    entry.emergency_reason = Some(plain);
                    entry.emergency_reason_encrypted = false;
                }
                Err(e) => debug!("Leaving reason for ticket {} sealed: {}", entry.ticket_id, e),
            }
        }
    }

    /// Optimistic read-modify-write loop against the store.
    async fn mutate<T, F>(&self, doctor_id: &str, mut apply: F) -> Result<T, QueueError>
    where
        F: FnMut(Option<QueueDocument>) -> Result<Mutation<T>, QueueError>,
    {
        let attempts = self.max_cas_retries + 1;

        for attempt in 1..=attempts {
            let existing = self.store.load(doctor_id).await?;
            let expected_version = existing.as_ref().map_or(0, |d| d.version);

            match apply(existing)? {
                Mutation::Skip(outcome) => return Ok(outcome),
                Mutation::Write(mut document, outcome) => {
                    document.version = expected_version + 1;
                    document.updated_at = Utc::now();

                    if self.store.compare_and_swap(&document, expected_version).await? {
                        return Ok(outcome);
                    }
                    debug!("Write conflict on doctor {} (attempt {}/{})", doctor_id, attempt, attempts);
                }
            }
        }

        warn!("Giving up on doctor {} after {} conflicting writes", doctor_id, attempts);
        Err(QueueError::ConcurrentModification {
            doctor_id: doctor_id.to_string(),
            attempts,
        })
    }
}

fn require<'a>(value: &'a str, field: &str) -> Result<&'a str, QueueError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(QueueError::ValidationError(format!("{} is required", field)));
    }
    Ok(trimmed)
}

/// `T-{doctorId}-{BASE36 microseconds}`.
pub fn generate_ticket_id(doctor_id: &str, at: DateTime<Utc>) -> String {
    format!("T-{}-{}", doctor_id, to_base36(at.timestamp_micros().max(0) as u64))
}

/// Suffix `candidate` until it does not clash with any ticket already in the document.
fn unique_ticket_id(document: &QueueDocument, candidate: &str) -> String {
    if !document.contains_ticket(candidate) {
        return candidate.to_string();
    }

    let mut n = 2u32;
    loop {
        let next = format!("{}-{}", candidate, n);
        if !document.contains_ticket(&next) {
            return next;
        }
        n += 1;
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if value == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
