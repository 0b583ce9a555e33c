use thiserror::Error;
use tracing::error;

use shared_database::DatabaseError;
use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Token store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Token store error: {0}")]
    StoreError(String),
}

impl From<DatabaseError> for TokenError {
    fn from(e: DatabaseError) -> Self {
        if e.is_transient() {
            TokenError::StoreUnavailable(e.to_string())
        } else {
            TokenError::StoreError(e.to_string())
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::ValidationError(msg) => AppError::ValidationError(msg),
            TokenError::NotFound(msg) => AppError::NotFound(msg),
            TokenError::StoreUnavailable(msg) => AppError::ServiceUnavailable(msg),
            TokenError::StoreError(msg) => {
                error!("Token store failure: {}", msg);
                AppError::Internal("Internal server error".to_string())
            }
        }
    }
}
