use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use queue_cell::{create_queue_router, QueueService};
use token_cell::{create_token_router, TokenService};

pub fn create_router(queues: Arc<QueueService>, tokens: Arc<TokenService>) -> Router {
    Router::new()
        .route("/", get(|| async { "Hospital Queue API is running!" }))
        .nest("/queues", create_queue_router(queues))
        .nest("/tokens", create_token_router(tokens))
}
