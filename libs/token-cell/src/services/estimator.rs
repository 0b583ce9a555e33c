use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use shared_config::{AppConfig, DEFAULT_AVERAGE_CONSULT_MINUTES, MAX_AVERAGE_CONSULT_MINUTES};

use crate::{
    AppointmentEstimate, Directory, DoctorSummary, InMemoryDirectory, InMemoryTokenStore,
    QueueStatus, SupabaseDirectory, SupabaseTokenStore, TokenDocument, TokenError, TokenLookup,
    TokenStatus, TokenStore,
};

/// Resolves a patient's token and estimates where they stand in the department queue.
pub struct TokenService {
    tokens: Arc<dyn TokenStore>,
    directory: Arc<dyn Directory>,
    average_consult_minutes: i64,
}

impl TokenService {
    pub fn new(tokens: Arc<dyn TokenStore>, directory: Arc<dyn Directory>) -> Self {
        Self {
            tokens,
            directory,
            average_consult_minutes: DEFAULT_AVERAGE_CONSULT_MINUTES,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let service = if config.is_configured() {
            Self::new(
                Arc::new(SupabaseTokenStore::new(config)),
                Arc::new(SupabaseDirectory::new(config)),
            )
        } else {
            warn!("Supabase not configured, token lookups use an empty in-memory store");
            Self::new(Arc::new(InMemoryTokenStore::new()), Arc::new(InMemoryDirectory::new()))
        };

        service.with_average_consult_minutes(config.average_consult_minutes)
    }

    pub fn with_average_consult_minutes(mut self, minutes: i64) -> Self {
        self.average_consult_minutes = minutes.clamp(0, MAX_AVERAGE_CONSULT_MINUTES);
        self
    }

    /// Token number first; otherwise mobile number → patient → today's active token,
    /// falling back to the token number recorded on the patient profile.
    pub async fn resolve_token(&self, lookup: &TokenLookup) -> Result<TokenDocument, TokenError> {
        let token_number = non_blank(lookup.token_number.as_deref());
        let mobile_number = non_blank(lookup.mobile_number.as_deref());

        if let Some(token_number) = token_number {
            return self.tokens.find_by_token_number(token_number).await?
                .ok_or_else(|| TokenError::NotFound("Token not found".to_string()));
        }

        let Some(mobile_number) = mobile_number else {
            return Err(TokenError::ValidationError("Provide mobileNumber or tokenNumber".to_string()));
        };

        let patient = self.directory.find_patient_by_mobile(mobile_number).await?
            .ok_or_else(|| TokenError::NotFound("Patient not found for this mobile number".to_string()))?;

        let today = Utc::now().date_naive();
        if let Some(token) = self.tokens.find_latest_active_for_patient(&patient.patient_id, today).await? {
            return Ok(token);
        }

        debug!("No active token today for patient {}, trying profile token", patient.patient_id);
        if let Some(legacy) = non_blank(patient.token_number.as_deref()) {
            if let Some(token) = self.tokens.find_by_token_number(legacy).await? {
                return Ok(token);
            }
        }

        Err(TokenError::NotFound("Active token not found for this patient".to_string()))
    }

    pub async fn queue_status(&self, lookup: &TokenLookup) -> Result<QueueStatus, TokenError> {
        let token = self.resolve_token(lookup).await?;
        let patients_ahead = self.tokens.count_active_before(&token).await?;

        info!("Token {} has {} patients ahead", token.token_number, patients_ahead);
        Ok(QueueStatus { token, patients_ahead })
    }

    pub async fn appointment_time(&self, lookup: &TokenLookup) -> Result<AppointmentEstimate, TokenError> {
        let QueueStatus { token, patients_ahead } = self.queue_status(lookup).await?;

        let doctor = self.doctor_for(&token.department).await;
        let appointment_time = estimate_appointment_time(
            Utc::now(),
            patients_ahead as i64,
            self.average_consult_minutes,
        );

        Ok(AppointmentEstimate {
            token_number: token.token_number,
            patients_ahead,
            appointment_time,
            appointment_time_display: format_display_time(appointment_time),
            doctor,
        })
    }

    /// First active doctor of the department. Lookup failures are logged, not returned.
    async fn doctor_for(&self, department: &str) -> Option<DoctorSummary> {
        match self.directory
            .find_doctors_by_department(department, Some(TokenStatus::Active.as_str()))
            .await
        {
            Ok(doctors) => doctors.into_iter().next().map(DoctorSummary::from),
            Err(e) => {
                warn!("Doctor lookup for department {} failed: {}", department, e);
                None
            }
        }
    }
}

/// `now + max(patients_ahead, 0) × max(average_consult_minutes, 0)`, saturating at the
/// latest representable instant.
pub fn estimate_appointment_time(
    now: DateTime<Utc>,
    patients_ahead: i64,
    average_consult_minutes: i64,
) -> DateTime<Utc> {
    patients_ahead.max(0)
        .checked_mul(average_consult_minutes.max(0))
        .and_then(Duration::try_minutes)
        .and_then(|wait| now.checked_add_signed(wait))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// 12-hour clock, e.g. `02:30 PM`.
pub fn format_display_time(at: DateTime<Utc>) -> String {
    at.format("%I:%M %p").to_string()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
