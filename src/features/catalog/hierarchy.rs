//! The containment tree: Category ⊃ Subcategory ⊃ Product.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::modules::backend::{Collection, OnDelete, Relation};
use crate::shared::constants::{
    CATEGORY_IMAGE_FOLDER, PRODUCT_IMAGE_FOLDER, SUBCATEGORY_IMAGE_FOLDER,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Category,
    Subcategory,
    Product,
}

impl EntityKind {
    pub fn collection(&self) -> Collection {
        match self {
            EntityKind::Category => Collection::Categories,
            EntityKind::Subcategory => Collection::Subcategories,
            EntityKind::Product => Collection::Products,
        }
    }

    /// Kind owning this one, `None` for the root
    pub fn parent(&self) -> Option<ParentKind> {
        match self {
            EntityKind::Category => None,
            EntityKind::Subcategory => Some(ParentKind::Category),
            EntityKind::Product => Some(ParentKind::Subcategory),
        }
    }

    /// Field holding the parent id
    pub fn parent_key(&self) -> Option<&'static str> {
        self.parent().map(|p| p.child_key())
    }

    pub fn image_folder(&self) -> &'static str {
        match self {
            EntityKind::Category => CATEGORY_IMAGE_FOLDER,
            EntityKind::Subcategory => SUBCATEGORY_IMAGE_FOLDER,
            EntityKind::Product => PRODUCT_IMAGE_FOLDER,
        }
    }

    /// Navigation target of an entity.
    ///
    /// A category opens its subcategory list, a subcategory its product
    /// list, a product its detail page.
    pub fn href(&self, id: Uuid) -> String {
        match self {
            EntityKind::Category => format!("/categories/{}", id),
            EntityKind::Subcategory => format!("/products/{}", id),
            EntityKind::Product => format!("/product/{}", id),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Category => "category",
            EntityKind::Subcategory => "subcategory",
            EntityKind::Product => "product",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "category" => Ok(EntityKind::Category),
            "subcategory" => Ok(EntityKind::Subcategory),
            "product" => Ok(EntityKind::Product),
            other => Err(format!("unknown catalog kind '{}'", other)),
        }
    }
}

/// Kinds that own children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ParentKind {
    Category,
    Subcategory,
}

impl ParentKind {
    pub fn kind(&self) -> EntityKind {
        match self {
            ParentKind::Category => EntityKind::Category,
            ParentKind::Subcategory => EntityKind::Subcategory,
        }
    }

    pub fn child(&self) -> EntityKind {
        match self {
            ParentKind::Category => EntityKind::Subcategory,
            ParentKind::Subcategory => EntityKind::Product,
        }
    }

    /// Foreign key on the child pointing at this parent
    pub fn child_key(&self) -> &'static str {
        match self {
            ParentKind::Category => "category_id",
            ParentKind::Subcategory => "subcategory_id",
        }
    }
}

/// What deleting a parent does to its children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CascadePolicy {
    /// Descendants are removed with their parent
    #[default]
    Cascade,
    /// A parent with children cannot be deleted
    Restrict,
}

impl FromStr for CascadePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cascade" => Ok(CascadePolicy::Cascade),
            "restrict" => Ok(CascadePolicy::Restrict),
            other => Err(format!(
                "CATALOG_DELETE_POLICY must be 'cascade' or 'restrict', got '{}'",
                other
            )),
        }
    }
}

impl From<CascadePolicy> for OnDelete {
    fn from(policy: CascadePolicy) -> Self {
        match policy {
            CascadePolicy::Cascade => OnDelete::Cascade,
            CascadePolicy::Restrict => OnDelete::Restrict,
        }
    }
}

/// The two parent links of the catalog, under `policy`
pub fn relations(policy: CascadePolicy) -> Vec<Relation> {
    [ParentKind::Category, ParentKind::Subcategory]
        .into_iter()
        .map(|parent| Relation {
            child: parent.child().collection(),
            foreign_key: parent.child_key(),
            parent: parent.kind().collection(),
            on_delete: policy.into(),
        })
        .collect()
}
