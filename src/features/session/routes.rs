use axum::{routing::get, Router};

use super::handler;

pub fn routes() -> Router {
    Router::new().route("/api/session", get(handler::get_session))
}
