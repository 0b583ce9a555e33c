use std::sync::Arc;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::handlers::{
    dequeue_normal,
    enqueue,
    enqueue_upload,
    get_queue,
    resolve_emergency,
    start_emergency,
};
use crate::QueueService;

/// Room for the form fields and multipart framing around the document itself.
const ENQUEUE_BODY_OVERHEAD: usize = 64 * 1024;

pub fn create_queue_router(service: Arc<QueueService>) -> Router {
    let body_limit = enqueue_body_limit(service.max_attachment_bytes());

    Router::new()
        .route("/enqueue", post(enqueue).layer(DefaultBodyLimit::max(body_limit)))
        .route("/enqueue/upload", post(enqueue_upload).layer(DefaultBodyLimit::max(body_limit)))
        .route("/{doctor_id}", get(get_queue))
        .route("/{doctor_id}/emergency/start", post(start_emergency))
        .route("/{doctor_id}/emergency/resolve", post(resolve_emergency))
        .route("/{doctor_id}/dequeue", post(dequeue_normal))
        .with_state(service)
}

/// Largest enqueue body accepted: a base64 encoded document of `max_attachment_bytes`
/// plus the surrounding fields. Multipart bodies carry raw bytes and fit as well.
pub fn enqueue_body_limit(max_attachment_bytes: usize) -> usize {
    max_attachment_bytes
        .div_ceil(3)
        .saturating_mul(4)
        .saturating_add(ENQUEUE_BODY_OVERHEAD)
}
