use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde_json::json;

use shared_config::{AppConfig, QueueBackend};

/// base64 of the 32 ASCII bytes "0123456789abcdef0123456789abcdef".
pub const TEST_ENCRYPTION_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub encryption_key: Option<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            encryption_key: Some(TEST_ENCRYPTION_KEY.to_string()),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn without_encryption(mut self) -> Self {
        self.encryption_key = None;
        self
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            queue_backend: QueueBackend::Memory,
            field_encryption_key: self.encryption_key.clone(),
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn token_row(
        token_number: &str,
        patient_id: &str,
        department: &str,
        date: &str,
        status: &str,
        generated_at: DateTime<Utc>,
    ) -> serde_json::Value {
        json!({
            "token_number": token_number,
            "hospital_name": "City General Hospital",
            "department": department,
            "date": date,
            "status": status,
            "generated_at": generated_at.to_rfc3339(),
            "patient_id": patient_id,
            "patient_name": "Test Patient"
        })
    }

    pub fn patient_row(patient_id: &str, mobile_number: &str, token_number: Option<&str>) -> serde_json::Value {
        json!({
            "patient_id": patient_id,
            "full_name": "Test Patient",
            "mobile_number": mobile_number,
            "token_number": token_number
        })
    }

    pub fn doctor_row(doctor_id: &str, name: &str, department: &str) -> serde_json::Value {
        json!({
            "doctor_id": doctor_id,
            "name": name,
            "department": department,
            "status": "Active"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
