use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CatalogEntity;
use crate::features::catalog::dtos::SubcategoryResponseDto;
use crate::features::catalog::hierarchy::EntityKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub category_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl CatalogEntity for Subcategory {
    const KIND: EntityKind = EntityKind::Subcategory;

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn parent_id(&self) -> Option<Uuid> {
        Some(self.category_id)
    }

    fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }
}

impl From<Subcategory> for SubcategoryResponseDto {
    fn from(s: Subcategory) -> Self {
        Self {
            id: s.id,
            name: s.name,
            image_url: s.image_url,
            category_id: s.category_id,
            href: EntityKind::Subcategory.href(s.id),
            created_at: s.created_at,
        }
    }
}
