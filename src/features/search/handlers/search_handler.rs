use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::features::search::dispatcher::SearchDispatcher;
use crate::features::search::models::SearchState;
use crate::shared::types::ApiResponse;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchParams {
    /// Search text; trimmed, shorter than the minimum length is not searched
    #[serde(default)]
    pub q: String,
}

/// One-shot search across categories, subcategories and products
#[utoipa::path(
    get,
    path = "/api/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Grouped results", body = ApiResponse<SearchState>)
    ),
    tag = "search"
)]
pub async fn search(
    State(dispatcher): State<Arc<SearchDispatcher>>,
    Query(params): Query<SearchParams>,
) -> Json<ApiResponse<SearchState>> {
    let state = match dispatcher.accept(&params.q) {
        Some(query) => dispatcher.dispatch(&query).await.state(),
        None => SearchState::NotSearched,
    };
    Json(ApiResponse::success(Some(state), None, None))
}

#[cfg(test)]
mod tests {
    use crate::core::config::SearchConfig;
    use crate::features::search::dispatcher::SearchDispatcher;
    use crate::features::search::routes::routes;
    use crate::features::session::RoleGate;
    use crate::modules::backend::{Collection, DataBackend, InMemoryBackend};
    use crate::shared::test_helpers::StaticTokenVerifier;
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::sync::Arc;

    async fn server() -> TestServer {
        let backend = Arc::new(InMemoryBackend::new(Vec::new()));
        backend
            .insert(
                Collection::Categories,
                json!({"id": "00000000-0000-0000-0000-0000000000c1", "name": "Quincaillerie", "image_url": null, "created_at": "2025-01-01T00:00:00Z"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();
        let dispatcher = Arc::new(SearchDispatcher::new(
            backend.clone(),
            SearchConfig::default(),
        ));
        let gate = Arc::new(RoleGate::new(backend));
        let app = routes(dispatcher, gate, Arc::new(StaticTokenVerifier::default()));
        TestServer::new(app).unwrap()
    }

    #[tokio::test]
    async fn test_search_groups_results() {
        let server = server().await;

        let response = server.get("/api/search").add_query_param("q", " quinc ").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["status"], "results");
        assert_eq!(body["data"]["sections"][0]["kind"], "category");
        assert_eq!(
            body["data"]["sections"][0]["rows"][0]["href"],
            "/categories/00000000-0000-0000-0000-0000000000c1"
        );
    }

    #[tokio::test]
    async fn test_short_query_is_not_searched() {
        let server = server().await;

        let body: Value = server
            .get("/api/search")
            .add_query_param("q", "q")
            .await
            .json();
        assert_eq!(body["data"]["status"], "notSearched");

        let body: Value = server.get("/api/search").await.json();
        assert_eq!(body["data"]["status"], "notSearched");
    }

    #[tokio::test]
    async fn test_no_match() {
        let server = server().await;

        let body: Value = server
            .get("/api/search")
            .add_query_param("q", "perceuse")
            .await
            .json();
        assert_eq!(body["data"]["status"], "noResults");
    }
}
