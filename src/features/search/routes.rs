use std::sync::Arc;

use axum::{routing::get, Router};

use crate::features::auth::TokenVerifier;
use crate::features::search::dispatcher::SearchDispatcher;
use crate::features::search::handlers::{self, LiveSearchState};
use crate::features::session::RoleGate;

pub fn routes(
    dispatcher: Arc<SearchDispatcher>,
    gate: Arc<RoleGate>,
    verifier: Arc<dyn TokenVerifier>,
) -> Router {
    let live = LiveSearchState {
        dispatcher: dispatcher.clone(),
        gate,
        verifier,
    };

    Router::new()
        .route("/api/search", get(handlers::search))
        .with_state(dispatcher)
        .merge(
            Router::new()
                .route("/api/search/live", get(handlers::live_search))
                .with_state(live),
        )
}
