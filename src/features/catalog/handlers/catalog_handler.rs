use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::form::CatalogForm;
use crate::core::error::Result;
use crate::features::auth::guards::RequireCatalogEditor;
use crate::features::catalog::dtos::{
    AncestryDto, CatalogEntryDto, CatalogFormDto, CategoryResponseDto, DeleteEntryResponseDto,
    ProductResponseDto, SubcategoryResponseDto,
};
use crate::features::catalog::hierarchy::EntityKind;
use crate::features::catalog::models::{Category, Product, Subcategory};
use crate::features::catalog::services::CatalogService;
use crate::shared::types::{ApiResponse, Meta};

fn listing<T>(items: Vec<T>) -> Json<ApiResponse<Vec<T>>> {
    let total = items.len() as i64;
    Json(ApiResponse::success(Some(items), None, Some(Meta::total(total))))
}

/// List all categories
#[utoipa::path(
    get,
    path = "/api/categories",
    responses(
        (status = 200, description = "Categories, oldest first", body = ApiResponse<Vec<CategoryResponseDto>>)
    ),
    tag = "catalog"
)]
pub async fn list_categories(
    State(service): State<Arc<CatalogService>>,
) -> Result<Json<ApiResponse<Vec<CategoryResponseDto>>>> {
    let categories = service.list_categories().await?;
    Ok(listing(categories.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category", body = ApiResponse<CategoryResponseDto>),
        (status = 404, description = "Category not found")
    ),
    tag = "catalog"
)]
pub async fn get_category(
    State(service): State<Arc<CatalogService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CategoryResponseDto>>> {
    let category = service.get::<Category>(id).await?;
    Ok(Json(ApiResponse::success(Some(category.into()), None, None)))
}

/// List the subcategories of a category
///
/// An unknown category yields an empty list.
#[utoipa::path(
    get,
    path = "/api/categories/{id}/subcategories",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Subcategories, oldest first", body = ApiResponse<Vec<SubcategoryResponseDto>>)
    ),
    tag = "catalog"
)]
pub async fn list_subcategories(
    State(service): State<Arc<CatalogService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<SubcategoryResponseDto>>>> {
    let subcategories = service.list_children::<Subcategory>(id).await?;
    Ok(listing(subcategories.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/subcategories/{id}",
    params(("id" = Uuid, Path, description = "Subcategory ID")),
    responses(
        (status = 200, description = "Subcategory", body = ApiResponse<SubcategoryResponseDto>),
        (status = 404, description = "Subcategory not found")
    ),
    tag = "catalog"
)]
pub async fn get_subcategory(
    State(service): State<Arc<CatalogService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<SubcategoryResponseDto>>> {
    let subcategory = service.get::<Subcategory>(id).await?;
    Ok(Json(ApiResponse::success(Some(subcategory.into()), None, None)))
}

/// List the products of a subcategory
#[utoipa::path(
    get,
    path = "/api/subcategories/{id}/products",
    params(("id" = Uuid, Path, description = "Subcategory ID")),
    responses(
        (status = 200, description = "Products, oldest first", body = ApiResponse<Vec<ProductResponseDto>>)
    ),
    tag = "catalog"
)]
pub async fn list_products(
    State(service): State<Arc<CatalogService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<ProductResponseDto>>>> {
    let products = service.list_children::<Product>(id).await?;
    Ok(listing(products.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<ProductResponseDto>),
        (status = 404, description = "Product not found")
    ),
    tag = "catalog"
)]
pub async fn get_product(
    State(service): State<Arc<CatalogService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductResponseDto>>> {
    let product = service.get::<Product>(id).await?;
    Ok(Json(ApiResponse::success(Some(product.into()), None, None)))
}

/// Breadcrumb chain of a catalog entry
///
/// When an ancestor has disappeared the chain is truncated, `complete` is
/// false and `back` points at the catalog root.
#[utoipa::path(
    get,
    path = "/api/catalog/{kind}/{id}/ancestors",
    params(
        ("kind" = EntityKind, Path, description = "category, subcategory or product"),
        ("id" = Uuid, Path, description = "Entry ID")
    ),
    responses(
        (status = 200, description = "Ancestry, root first", body = ApiResponse<AncestryDto>),
        (status = 404, description = "Entry not found")
    ),
    tag = "catalog"
)]
pub async fn get_ancestors(
    State(service): State<Arc<CatalogService>>,
    Path((kind, id)): Path<(EntityKind, Uuid)>,
) -> Result<Json<ApiResponse<AncestryDto>>> {
    let ancestry = service.resolve_ancestors(kind, id).await?;
    Ok(Json(ApiResponse::success(Some(ancestry), None, None)))
}

/// Create a category
#[utoipa::path(
    post,
    path = "/api/categories",
    request_body(content = CatalogFormDto, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Category created", body = ApiResponse<CategoryResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Catalog editor access required")
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn create_category(
    RequireCatalogEditor(_viewer): RequireCatalogEditor,
    State(service): State<Arc<CatalogService>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<CategoryResponseDto>>)> {
    let (draft, image) = CatalogForm::read(multipart).await?.into_draft();
    let category = service.create_category(draft, image).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(category.into()), None, None)),
    ))
}

/// Create a subcategory under a category
#[utoipa::path(
    post,
    path = "/api/categories/{id}/subcategories",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body(content = CatalogFormDto, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Subcategory created", body = ApiResponse<SubcategoryResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Category no longer exists")
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn create_subcategory(
    RequireCatalogEditor(_viewer): RequireCatalogEditor,
    State(service): State<Arc<CatalogService>>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<SubcategoryResponseDto>>)> {
    let (draft, image) = CatalogForm::read(multipart).await?.into_draft();
    let subcategory = service.create_child::<Subcategory>(id, draft, image).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(subcategory.into()), None, None)),
    ))
}

/// Create a product under a subcategory
#[utoipa::path(
    post,
    path = "/api/subcategories/{id}/products",
    params(("id" = Uuid, Path, description = "Subcategory ID")),
    request_body(content = CatalogFormDto, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Product created", body = ApiResponse<ProductResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Subcategory no longer exists")
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn create_product(
    RequireCatalogEditor(_viewer): RequireCatalogEditor,
    State(service): State<Arc<CatalogService>>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<ProductResponseDto>>)> {
    let (draft, image) = CatalogForm::read(multipart).await?.into_draft();
    let product = service.create_child::<Product>(id, draft, image).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(product.into()), None, None)),
    ))
}

/// Update a catalog entry
///
/// Only the fields present in the form change. An empty `description` or
/// `code` clears it; `remove_image=true` drops the image.
#[utoipa::path(
    patch,
    path = "/api/catalog/{kind}/{id}",
    params(
        ("kind" = EntityKind, Path, description = "category, subcategory or product"),
        ("id" = Uuid, Path, description = "Entry ID")
    ),
    request_body(content = CatalogFormDto, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated entry", body = ApiResponse<CatalogEntryDto>),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Entry not found")
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn update_entry(
    RequireCatalogEditor(_viewer): RequireCatalogEditor,
    State(service): State<Arc<CatalogService>>,
    Path((kind, id)): Path<(EntityKind, Uuid)>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<CatalogEntryDto>>> {
    let (patch, image) = CatalogForm::read(multipart).await?.into_patch();
    let entry = service.update(kind, id, patch, image).await?;
    Ok(Json(ApiResponse::success(Some(entry), None, None)))
}

/// Delete a catalog entry
///
/// Under the cascade policy descendants are deleted too; under the restrict
/// policy a parent that still has children is refused with 409.
#[utoipa::path(
    delete,
    path = "/api/catalog/{kind}/{id}",
    params(
        ("kind" = EntityKind, Path, description = "category, subcategory or product"),
        ("id" = Uuid, Path, description = "Entry ID")
    ),
    responses(
        (status = 200, description = "Entry deleted", body = ApiResponse<DeleteEntryResponseDto>),
        (status = 404, description = "Entry not found"),
        (status = 409, description = "Entry still has children")
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn delete_entry(
    RequireCatalogEditor(_viewer): RequireCatalogEditor,
    State(service): State<Arc<CatalogService>>,
    Path((kind, id)): Path<(EntityKind, Uuid)>,
) -> Result<Json<ApiResponse<DeleteEntryResponseDto>>> {
    service.delete_entity(kind, id).await?;
    Ok(Json(ApiResponse::success(
        Some(DeleteEntryResponseDto {
            kind,
            id,
            deleted: true,
        }),
        Some(format!("{} deleted", kind)),
        None,
    )))
}
