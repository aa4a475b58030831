use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::features::catalog::hierarchy::EntityKind;

// =============================================================================
// RESPONSES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponseDto {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Navigation target of this category
    pub href: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryResponseDto {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub category_id: Uuid,
    pub href: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponseDto {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub subcategory_id: Uuid,
    pub href: String,
    pub created_at: DateTime<Utc>,
}

/// Any catalog entity, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CatalogEntryDto {
    Category(CategoryResponseDto),
    Subcategory(SubcategoryResponseDto),
    Product(ProductResponseDto),
}

/// One step of a breadcrumb chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CrumbDto {
    pub kind: EntityKind,
    pub id: Uuid,
    pub name: String,
    pub href: String,
}

/// Breadcrumb chain of an entity, root first, ending at the entity itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AncestryDto {
    pub crumbs: Vec<CrumbDto>,
    /// `false` when an ancestor is missing and the chain was truncated
    pub complete: bool,
    /// Where a "back" affordance should lead
    pub back: String,
}

/// Result of a delete
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEntryResponseDto {
    pub kind: EntityKind,
    pub id: Uuid,
    pub deleted: bool,
}

// =============================================================================
// INPUTS
// =============================================================================

/// Multipart form accepted by the catalog create and update endpoints.
///
/// For documentation only; handlers read the form with axum's `Multipart`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct CatalogFormDto {
    /// Display name (required on create)
    #[schema(example = "Visserie")]
    pub name: Option<String>,
    /// Products only; empty string clears it on update
    pub description: Option<String>,
    /// Products only; empty string clears it on update
    #[schema(example = "VB-440")]
    pub code: Option<String>,
    /// Optional image (jpeg, png, gif, webp; max 5MB)
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub image: Option<String>,
    /// Update only: drop the current image
    pub remove_image: Option<bool>,
}

/// Fields of a new catalog entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryDraft {
    pub name: String,
    pub description: Option<String>,
    pub code: Option<String>,
}

/// Changes to an existing entry; `Some("")` clears description or code
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub code: Option<String>,
    pub remove_image: bool,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.code.is_none() && !self.remove_image
    }
}

/// Uploaded image bytes with their declared type
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}
