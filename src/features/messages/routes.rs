use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use super::handler;
use super::service::MessageService;

pub fn routes(service: Arc<MessageService>) -> Router {
    Router::new()
        .route("/api/messages", post(handler::create_message))
        .route("/api/admin/messages", get(handler::list_messages))
        .route(
            "/api/admin/messages/{id}/process",
            post(handler::process_message),
        )
        .with_state(service)
}
