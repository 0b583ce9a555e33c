use std::sync::Arc;
use axum::{routing::post, Router};

use crate::handlers::{appointment_time, queue_status};
use crate::TokenService;

pub fn create_token_router(service: Arc<TokenService>) -> Router {
    Router::new()
        .route("/queue-status", post(queue_status))
        .route("/appointment-time", post(appointment_time))
        .with_state(service)
}
