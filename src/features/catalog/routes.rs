use std::sync::Arc;

use axum::{
    routing::{get, patch},
    Router,
};

use crate::features::catalog::handlers;
use crate::features::catalog::services::CatalogService;

/// Catalog browsing is public; writes are guarded per handler
pub fn routes(service: Arc<CatalogService>) -> Router {
    Router::new()
        .route(
            "/api/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route("/api/categories/{id}", get(handlers::get_category))
        .route(
            "/api/categories/{id}/subcategories",
            get(handlers::list_subcategories).post(handlers::create_subcategory),
        )
        .route("/api/subcategories/{id}", get(handlers::get_subcategory))
        .route(
            "/api/subcategories/{id}/products",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route("/api/products/{id}", get(handlers::get_product))
        .route(
            "/api/catalog/{kind}/{id}",
            patch(handlers::update_entry).delete(handlers::delete_entry),
        )
        .route(
            "/api/catalog/{kind}/{id}/ancestors",
            get(handlers::get_ancestors),
        )
        .with_state(service)
}
