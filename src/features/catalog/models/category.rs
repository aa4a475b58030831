use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CatalogEntity;
use crate::features::catalog::dtos::CategoryResponseDto;
use crate::features::catalog::hierarchy::EntityKind;

/// Backend record of a category, the root of the hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CatalogEntity for Category {
    const KIND: EntityKind = EntityKind::Category;

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn parent_id(&self) -> Option<Uuid> {
        None
    }

    fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }
}

impl From<Category> for CategoryResponseDto {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            name: c.name,
            image_url: c.image_url,
            href: EntityKind::Category.href(c.id),
            created_at: c.created_at,
        }
    }
}
