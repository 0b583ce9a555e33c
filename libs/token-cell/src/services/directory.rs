use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::{filter_value, SupabaseClient};

use crate::{DoctorRecord, PatientProfile, TokenError};

/// Patient and doctor lookups the estimator needs.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn find_patient_by_mobile(&self, mobile_number: &str) -> Result<Option<PatientProfile>, TokenError>;

    async fn find_doctors_by_department(
        &self,
        department: &str,
        status: Option<&str>,
    ) -> Result<Vec<DoctorRecord>, TokenError>;
}

pub struct SupabaseDirectory {
    supabase: SupabaseClient,
}

impl SupabaseDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

fn decode_rows<T: serde::de::DeserializeOwned>(rows: Vec<Value>, table: &str) -> Result<Vec<T>, TokenError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row)
                .map_err(|e| TokenError::StoreError(format!("Malformed {} row: {}", table, e)))
        })
        .collect()
}

#[async_trait]
impl Directory for SupabaseDirectory {
    async fn find_patient_by_mobile(&self, mobile_number: &str) -> Result<Option<PatientProfile>, TokenError> {
        debug!("Looking up patient profile by mobile number");

        let path = format!(
            "/rest/v1/patients_profile?mobile_number=eq.{}&limit=1",
            filter_value(mobile_number)
        );
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;

        Ok(decode_rows(rows, "patients_profile")?.into_iter().next())
    }

    async fn find_doctors_by_department(
        &self,
        department: &str,
        status: Option<&str>,
    ) -> Result<Vec<DoctorRecord>, TokenError> {
        debug!("Looking up doctors for department {}", department);

        let mut path = format!(
            "/rest/v1/doctors_list?select=doctor_id,name,department,status&department=eq.{}",
            filter_value(department)
        );
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", filter_value(status)));
        }

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        decode_rows(rows, "doctors_list")
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    patients: RwLock<Vec<PatientProfile>>,
    doctors: RwLock<Vec<DoctorRecord>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_patient(&self, patient: PatientProfile) {
        self.patients.write().await.push(patient);
    }

    pub async fn add_doctor(&self, doctor: DoctorRecord) {
        self.doctors.write().await.push(doctor);
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn find_patient_by_mobile(&self, mobile_number: &str) -> Result<Option<PatientProfile>, TokenError> {
        let patients = self.patients.read().await;
        Ok(patients.iter().find(|p| p.mobile_number == mobile_number).cloned())
    }

    async fn find_doctors_by_department(
        &self,
        department: &str,
        status: Option<&str>,
    ) -> Result<Vec<DoctorRecord>, TokenError> {
        let doctors = self.doctors.read().await;
        Ok(doctors
            .iter()
            .filter(|d| d.department == department)
            .filter(|d| status.map_or(true, |s| d.status.as_deref() == Some(s)))
            .cloned()
            .collect())
    }
}
