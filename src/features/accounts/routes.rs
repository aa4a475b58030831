use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::features::accounts::handlers;
use crate::features::accounts::services::AccountService;

pub fn routes(service: Arc<AccountService>) -> Router {
    Router::new()
        .route("/api/accounts/register", post(handlers::register))
        .route("/api/accounts/me", get(handlers::get_me))
        .route("/api/admin/accounts", get(handlers::list_accounts))
        .route(
            "/api/admin/accounts/{id}/validate",
            post(handlers::validate_account),
        )
        .route("/api/admin/accounts/{id}/block", post(handlers::block_account))
        .route("/api/admin/accounts/{id}/role", patch(handlers::change_role))
        .with_state(service)
}
