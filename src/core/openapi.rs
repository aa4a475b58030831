use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::accounts::{dtos as accounts_dtos, handlers as accounts_handlers};
use crate::features::catalog::{dtos as catalog_dtos, handlers as catalog_handlers};
use crate::features::messages::{dto as messages_dto, handler as messages_handler};
use crate::features::search::{handlers as search_handlers, models as search_models};
use crate::features::session::{handler as session_handler, Capabilities, Role, SessionSummary};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Session
        session_handler::get_session,
        // Catalog (public reads)
        catalog_handlers::list_categories,
        catalog_handlers::get_category,
        catalog_handlers::list_subcategories,
        catalog_handlers::get_subcategory,
        catalog_handlers::list_products,
        catalog_handlers::get_product,
        catalog_handlers::get_ancestors,
        // Catalog (editors)
        catalog_handlers::create_category,
        catalog_handlers::create_subcategory,
        catalog_handlers::create_product,
        catalog_handlers::update_entry,
        catalog_handlers::delete_entry,
        // Search
        search_handlers::search,
        search_handlers::live_search,
        // Accounts
        accounts_handlers::register,
        accounts_handlers::get_me,
        accounts_handlers::list_accounts,
        accounts_handlers::validate_account,
        accounts_handlers::block_account,
        accounts_handlers::change_role,
        // Messages
        messages_handler::create_message,
        messages_handler::list_messages,
        messages_handler::process_message,
    ),
    components(
        schemas(
            // Shared
            Meta,
            // Session
            Role,
            Capabilities,
            SessionSummary,
            ApiResponse<SessionSummary>,
            // Catalog
            catalog_dtos::CategoryResponseDto,
            catalog_dtos::SubcategoryResponseDto,
            catalog_dtos::ProductResponseDto,
            catalog_dtos::CatalogEntryDto,
            catalog_dtos::CatalogFormDto,
            catalog_dtos::CrumbDto,
            catalog_dtos::AncestryDto,
            catalog_dtos::DeleteEntryResponseDto,
            ApiResponse<Vec<catalog_dtos::CategoryResponseDto>>,
            ApiResponse<catalog_dtos::CategoryResponseDto>,
            ApiResponse<Vec<catalog_dtos::SubcategoryResponseDto>>,
            ApiResponse<catalog_dtos::SubcategoryResponseDto>,
            ApiResponse<Vec<catalog_dtos::ProductResponseDto>>,
            ApiResponse<catalog_dtos::ProductResponseDto>,
            ApiResponse<catalog_dtos::CatalogEntryDto>,
            ApiResponse<catalog_dtos::AncestryDto>,
            ApiResponse<catalog_dtos::DeleteEntryResponseDto>,
            // Search
            search_models::SearchRow,
            search_models::SearchSection,
            search_models::SearchState,
            search_handlers::LiveCommand,
            search_handlers::LiveEvent,
            ApiResponse<search_models::SearchState>,
            // Accounts
            accounts_dtos::RegisterAccountDto,
            accounts_dtos::AccountResponseDto,
            accounts_dtos::ChangeRoleDto,
            ApiResponse<accounts_dtos::AccountResponseDto>,
            ApiResponse<Vec<accounts_dtos::AccountResponseDto>>,
            // Messages
            messages_dto::CreateMessageDto,
            messages_dto::MessageResponseDto,
            ApiResponse<messages_dto::MessageResponseDto>,
            ApiResponse<Vec<messages_dto::MessageResponseDto>>,
        )
    ),
    tags(
        (name = "session", description = "Current session, role and capabilities"),
        (name = "catalog", description = "Category, subcategory and product hierarchy"),
        (name = "search", description = "Grouped catalog search, one-shot and live over WebSocket"),
        (name = "accounts", description = "Business account registration and validation"),
        (name = "messages", description = "Contact messages"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Catalog API",
        version = "0.1.0",
        description = "API documentation for the B2B catalog",
    )
)]
pub struct ApiDoc;

/// Adds Bearer JWT security scheme to OpenAPI spec
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_lists_every_surface() {
        let mut openapi = ApiDoc::openapi();
        SwaggerInfoModifier {
            title: "Test".to_string(),
            version: "9.9.9".to_string(),
            description: "docs".to_string(),
        }
        .modify(&mut openapi);

        assert_eq!(openapi.info.title, "Test");
        for path in [
            "/api/session",
            "/api/categories",
            "/api/catalog/{kind}/{id}",
            "/api/search",
            "/api/search/live",
            "/api/admin/accounts/{id}/validate",
            "/api/admin/messages/{id}/process",
        ] {
            assert!(openapi.paths.paths.contains_key(path), "missing {}", path);
        }
        let components = openapi.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
