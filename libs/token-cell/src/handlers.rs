use std::sync::Arc;
use axum::{extract::State, response::Json};
use chrono::SecondsFormat;
use serde_json::{json, Value};
use tracing::debug;

use shared_models::error::AppError;

use crate::{TokenLookup, TokenService};

/// Position of a token among today's active tokens in its department
pub async fn queue_status(
    State(service): State<Arc<TokenService>>,
    Json(lookup): Json<TokenLookup>,
) -> Result<Json<Value>, AppError> {
    debug!("Queue status request");

    let status = service.queue_status(&lookup).await?;
    let token = status.token;

    Ok(Json(json!({
        "success": true,
        "tokenNumber": token.token_number,
        "queue": {
            "patientsAhead": status.patients_ahead,
            "status": token.status
        },
        "token": {
            "hospitalName": token.hospital_name,
            "department": token.department,
            "date": token.date.format("%Y-%m-%d").to_string(),
            "generatedAt": token.generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "patientId": token.patient_id,
            "patientName": token.patient_name
        }
    })))
}

pub async fn appointment_time(
    State(service): State<Arc<TokenService>>,
    Json(lookup): Json<TokenLookup>,
) -> Result<Json<Value>, AppError> {
    debug!("Appointment time request");

    let estimate = service.appointment_time(&lookup).await?;

    Ok(Json(json!({
        "success": true,
        "tokenNumber": estimate.token_number,
        "appointmentTime": estimate.appointment_time.to_rfc3339_opts(SecondsFormat::Millis, true),
        "appointmentTimeDisplay": estimate.appointment_time_display,
        "doctor": estimate.doctor,
        "queue": {
            "patientsAhead": estimate.patients_ahead
        }
    })))
}
