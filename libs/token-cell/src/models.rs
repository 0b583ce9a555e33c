use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TokenStatus {
    Active,
    Completed,
    Cancelled,
    Expired,
    /// Any status string this service does not know about, kept verbatim.
    Other(String),
}

impl TokenStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TokenStatus::Active => "Active",
            TokenStatus::Completed => "Completed",
            TokenStatus::Cancelled => "Cancelled",
            TokenStatus::Expired => "Expired",
            TokenStatus::Other(s) => s,
        }
    }
}

impl From<String> for TokenStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Active" => TokenStatus::Active,
            "Completed" => TokenStatus::Completed,
            "Cancelled" => TokenStatus::Cancelled,
            "Expired" => TokenStatus::Expired,
            _ => TokenStatus::Other(s),
        }
    }
}

impl From<TokenStatus> for String {
    fn from(status: TokenStatus) -> Self {
        status.as_str().to_string()
    }
}

/// A row of the `tokens` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenDocument {
    pub token_number: String,
    pub hospital_name: String,
    pub department: String,
    pub date: NaiveDate,
    pub status: TokenStatus,
    pub generated_at: DateTime<Utc>,
    pub patient_id: String,
    #[serde(default)]
    pub patient_name: Option<String>,
}

impl TokenDocument {
    pub fn is_active(&self) -> bool {
        self.status == TokenStatus::Active
    }

    /// Same hospital, department and day: the tokens that compete for one queue.
    pub fn same_partition(&self, other: &TokenDocument) -> bool {
        self.hospital_name == other.hospital_name
            && self.department == other.department
            && self.date == other.date
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub patient_id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub mobile_number: String,
    /// Legacy pointer to the patient's most recent token.
    #[serde(default)]
    pub token_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorRecord {
    pub doctor_id: String,
    pub name: String,
    pub department: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorSummary {
    pub name: String,
    pub department: String,
    pub doctor_id: String,
}

impl From<DoctorRecord> for DoctorSummary {
    fn from(doctor: DoctorRecord) -> Self {
        Self {
            name: doctor.name,
            department: doctor.department,
            doctor_id: doctor.doctor_id,
        }
    }
}

/// Body of both token endpoints. `tokenNumber` wins when both are given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenLookup {
    pub mobile_number: Option<String>,
    pub token_number: Option<String>,
}

impl TokenLookup {
    pub fn by_token(token_number: &str) -> Self {
        Self { token_number: Some(token_number.to_string()), mobile_number: None }
    }

    pub fn by_mobile(mobile_number: &str) -> Self {
        Self { mobile_number: Some(mobile_number.to_string()), token_number: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueStatus {
    pub token: TokenDocument,
    pub patients_ahead: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentEstimate {
    pub token_number: String,
    pub patients_ahead: u64,
    pub appointment_time: DateTime<Utc>,
    pub appointment_time_display: String,
    pub doctor: Option<DoctorSummary>,
}
