use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::features::catalog::models::{CatalogEntity, Category, Product, Subcategory};
use crate::features::catalog::EntityKind;

/// One match, tagged by the collection it came from
#[derive(Debug, Clone, PartialEq)]
pub enum SearchResult {
    Category(Category),
    Subcategory(Subcategory),
    Product(Product),
}

impl SearchResult {
    pub fn kind(&self) -> EntityKind {
        match self {
            SearchResult::Category(_) => EntityKind::Category,
            SearchResult::Subcategory(_) => EntityKind::Subcategory,
            SearchResult::Product(_) => EntityKind::Product,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            SearchResult::Category(c) => c.id(),
            SearchResult::Subcategory(s) => s.id(),
            SearchResult::Product(p) => p.id(),
        }
    }

    /// Where selecting this result navigates to
    pub fn href(&self) -> String {
        self.kind().href(self.id())
    }

    pub fn row(&self) -> SearchRow {
        fn row_of<T: CatalogEntity>(entity: &T) -> SearchRow {
            SearchRow {
                kind: T::KIND,
                id: entity.id(),
                name: entity.name().to_string(),
                code: entity.code().map(str::to_string),
                image_url: entity.image_url().map(str::to_string),
                href: T::KIND.href(entity.id()),
            }
        }

        match self {
            SearchResult::Category(c) => row_of(c),
            SearchResult::Subcategory(s) => row_of(s),
            SearchResult::Product(p) => row_of(p),
        }
    }
}

/// Compact display row of a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchRow {
    pub kind: EntityKind,
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub href: String,
}

/// Results of one collection, in backend order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchSection {
    pub kind: EntityKind,
    pub rows: Vec<SearchRow>,
}

/// What the result area shows
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SearchState {
    /// No query has been dispatched for the current input
    #[default]
    NotSearched,
    /// A query ran and nothing matched
    NoResults,
    /// Sections in fixed order: categories, subcategories, products; empty ones omitted
    Results { sections: Vec<SearchSection> },
}

impl SearchState {
    /// Group results into sections, keeping category, subcategory, product order
    pub fn from_results(results: &[SearchResult]) -> Self {
        let sections: Vec<SearchSection> =
            [EntityKind::Category, EntityKind::Subcategory, EntityKind::Product]
                .into_iter()
                .filter_map(|kind| {
                    let rows: Vec<SearchRow> = results
                        .iter()
                        .filter(|r| r.kind() == kind)
                        .map(SearchResult::row)
                        .collect();
                    (!rows.is_empty()).then_some(SearchSection { kind, rows })
                })
                .collect();

        if sections.is_empty() {
            SearchState::NoResults
        } else {
            SearchState::Results { sections }
        }
    }

    pub fn sections(&self) -> &[SearchSection] {
        match self {
            SearchState::Results { sections } => sections,
            _ => &[],
        }
    }
}
