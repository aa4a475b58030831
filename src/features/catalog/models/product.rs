use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CatalogEntity;
use crate::features::catalog::dtos::ProductResponseDto;
use crate::features::catalog::hierarchy::EntityKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Human-readable product reference, e.g. "VB-440"
    pub code: Option<String>,
    pub image_url: Option<String>,
    pub subcategory_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl CatalogEntity for Product {
    const KIND: EntityKind = EntityKind::Product;

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn parent_id(&self) -> Option<Uuid> {
        Some(self.subcategory_id)
    }

    fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

impl From<Product> for ProductResponseDto {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            code: p.code,
            image_url: p.image_url,
            subcategory_id: p.subcategory_id,
            href: EntityKind::Product.href(p.id),
            created_at: p.created_at,
        }
    }
}
