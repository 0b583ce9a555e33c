use std::sync::Arc;
use axum::{
    extract::{Multipart, Path, State},
    response::Json,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_models::error::AppError;

use crate::{AttachmentUpload, EnqueueRequest, QueueService};

/// Current queue for a doctor
pub async fn get_queue(
    State(service): State<Arc<QueueService>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    debug!("Queue request for doctor: {}", doctor_id);

    let view = service.get_queue(&doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "queue": view.queue,
        "doctorBusyWithEmergency": view.doctor_busy_with_emergency,
        "emergencyCount": view.emergency_count,
        "normalCount": view.normal_count
    })))
}

/// Join a doctor's queue (JSON body, attachment as base64)
pub async fn enqueue(
    State(service): State<Arc<QueueService>>,
    Json(mut request): Json<EnqueueRequest>,
) -> Result<Json<Value>, AppError> {
    info!("Enqueue request for doctor: {}", request.doctor_id);

    let upload = request.emergency_doc.take()
        .map(|payload| payload.decode())
        .transpose()?;

    let ticket = service.enqueue(request, upload).await?;

    Ok(Json(json!({
        "success": true,
        "ticket": ticket
    })))
}

/// Join a doctor's queue from a multipart form; the file field is `emergencyDoc`
pub async fn enqueue_upload(
    State(service): State<Arc<QueueService>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let mut fields = serde_json::Map::new();
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(format!("Invalid multipart body: {}", e))
    })? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "emergencyDoc" {
            let filename = field.file_name().map(str::to_string);
            let mime_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(|e| {
                AppError::BadRequest(format!("Failed to read emergencyDoc: {}", e))
            })?;
            upload = Some(AttachmentUpload::new(filename, mime_type, bytes.to_vec()));
        } else {
            let text = field.text().await.map_err(|e| {
                AppError::BadRequest(format!("Failed to read field {}: {}", name, e))
            })?;
            if !text.is_empty() {
                let value = form_value(&name, text);
                fields.insert(name, value);
            }
        }
    }

    let request: EnqueueRequest = serde_json::from_value(Value::Object(fields))
        .map_err(|e| AppError::ValidationError(format!("Invalid enqueue form: {}", e)))?;

    info!("Multipart enqueue request for doctor: {}", request.doctor_id);

    let ticket = service.enqueue(request, upload).await?;

    Ok(Json(json!({
        "success": true,
        "ticket": ticket
    })))
}

/// Begin treating the earliest pending emergency
pub async fn start_emergency(
    State(service): State<Arc<QueueService>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let current = service.start_emergency(&doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "currentEmergency": current
    })))
}

pub async fn resolve_emergency(
    State(service): State<Arc<QueueService>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let resolved = service.resolve_emergency(&doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "resolved": resolved
    })))
}

/// Serve the next normal patient
pub async fn dequeue_normal(
    State(service): State<Arc<QueueService>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let served = service.dequeue_normal(&doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "served": served
    })))
}

/// Form fields arrive as text; `age` is the only numeric one.
fn form_value(name: &str, text: String) -> Value {
    if name == "age" {
        if let Ok(age) = text.trim().parse::<u32>() {
            return json!(age);
        }
        return Value::Null;
    }
    Value::String(text)
}
