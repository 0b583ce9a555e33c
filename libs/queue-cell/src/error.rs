use thiserror::Error;
use tracing::error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Queue for doctor {doctor_id} changed concurrently {attempts} times, giving up")]
    ConcurrentModification { doctor_id: String, attempts: u32 },

    #[error("Queue store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Queue store error: {0}")]
    StoreError(String),

    #[error("Attachment error: {0}")]
    AttachmentError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<redis::RedisError> for QueueError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_refusal() || e.is_timeout() || e.is_connection_dropped() {
            QueueError::StoreUnavailable(e.to_string())
        } else {
            QueueError::StoreError(e.to_string())
        }
    }
}

impl From<QueueError> for AppError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::ValidationError(msg) => AppError::ValidationError(msg),
            QueueError::PreconditionFailed(msg) => AppError::BadRequest(msg),
            QueueError::Conflict(msg) => AppError::Conflict(msg),
            QueueError::ConcurrentModification { doctor_id, attempts } => AppError::Conflict(format!(
                "Queue for doctor {} is busy ({} conflicting updates), please retry",
                doctor_id, attempts
            )),
            QueueError::StoreUnavailable(msg) => {
                error!("Queue store unavailable: {}", msg);
                AppError::ServiceUnavailable("Queue store temporarily unavailable".to_string())
            }
            other => {
                error!("Queue operation failed: {}", other);
                AppError::Internal("Queue operation failed".to_string())
            }
        }
    }
}
