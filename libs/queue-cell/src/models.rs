use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const MAX_EMERGENCY_REASON_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Normal,
    Emergency,
}

/// One patient waiting in a doctor's queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub ticket_id: String,
    pub patient_name: String,
    pub patient_id: Option<String>,
    pub mobile_number: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub emergency_reason: Option<String>,
    #[serde(default)]
    pub emergency_reason_encrypted: bool,
    #[serde(default)]
    pub emergency_verified: bool,
    pub emergency_attachment: Option<EmergencyAttachment>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub city: Option<String>,
    pub hospital_id: Option<String>,
    pub hospital_name: Option<String>,
    pub emergency_type: Option<String>,
    pub preferred_doctor_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn is_emergency(&self) -> bool {
        self.entry_type == EntryType::Emergency
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyAttachment {
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub location: AttachmentLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum AttachmentLocation {
    /// Stored in the blob bucket; the document only keeps the reference.
    Remote { url: String, storage_path: String },
    /// Legacy form: the whole file as a `data:` URL inside the queue document.
    Inline { data_url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentEmergency {
    pub ticket_id: String,
    pub started_at: DateTime<Utc>,
}

/// Per-doctor queue record. `version` is bumped on every write and guards
/// concurrent read-modify-write cycles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueDocument {
    pub doctor_id: String,
    #[serde(default)]
    pub emergency_queue: Vec<QueueEntry>,
    #[serde(default)]
    pub normal_queue: Vec<QueueEntry>,
    pub current_emergency: Option<CurrentEmergency>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl QueueDocument {
    pub fn empty(doctor_id: &str) -> Self {
        Self {
            doctor_id: doctor_id.to_string(),
            emergency_queue: Vec::new(),
            normal_queue: Vec::new(),
            current_emergency: None,
            updated_at: Utc::now(),
            version: 0,
        }
    }

    /// Any active or pending emergency pre-empts the normal queue.
    pub fn is_busy_with_emergency(&self) -> bool {
        self.current_emergency.is_some() || !self.emergency_queue.is_empty()
    }

    pub fn contains_ticket(&self, ticket_id: &str) -> bool {
        self.emergency_queue.iter().any(|e| e.ticket_id == ticket_id)
            || self.normal_queue.iter().any(|e| e.ticket_id == ticket_id)
            || self.current_emergency.as_ref().map_or(false, |c| c.ticket_id == ticket_id)
    }

    pub fn push(&mut self, entry: QueueEntry) {
        match entry.entry_type {
            EntryType::Emergency => self.emergency_queue.push(entry),
            EntryType::Normal => self.normal_queue.push(entry),
        }
    }
}

/// Read-side projection returned by the queue endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueView {
    pub queue: QueueDocument,
    pub doctor_busy_with_emergency: bool,
    pub emergency_count: usize,
    pub normal_count: usize,
}

impl QueueView {
    pub fn new(queue: QueueDocument) -> Self {
        Self {
            doctor_busy_with_emergency: queue.is_busy_with_emergency(),
            emergency_count: queue.emergency_queue.len(),
            normal_count: queue.normal_queue.len(),
            queue,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    #[serde(default)]
    pub doctor_id: String,
    #[serde(default)]
    pub patient_name: String,
    pub patient_id: Option<String>,
    pub mobile_number: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub emergency: bool,
    pub emergency_reason: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub city: Option<String>,
    pub hospital_id: Option<String>,
    pub hospital_name: Option<String>,
    pub emergency_type: Option<String>,
    pub preferred_doctor_id: Option<String>,
    /// Optional document attached as base64 (plain or `data:` URL).
    pub emergency_doc: Option<AttachmentPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentPayload {
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    pub data: String,
}

/// A decoded upload, ready to hand to an attachment store.
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub size: u64,
}

impl AttachmentUpload {
    pub fn new(filename: Option<String>, mime_type: Option<String>, bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        Self {
            filename: filename.filter(|f| !f.is_empty()).unwrap_or_else(|| "document".to_string()),
            mime_type: mime_type
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            bytes,
            size,
        }
    }
}

/// Accepts `true`/`false` as well as the strings `"true"`/`"false"` sent by form clients.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Text(s)) => s.eq_ignore_ascii_case("true"),
        None => false,
    })
}
