use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::models::{SearchResult, SearchState};
use crate::core::config::SearchConfig;
use crate::features::catalog::models::{CatalogEntity, Category, Product, Subcategory};
use crate::features::catalog::EntityKind;
use crate::modules::backend::{decode, DataBackend, Filter, SelectQuery, SortDirection};

/// Merged results of one dispatch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    /// Categories, then subcategories, then products; ids unique per kind
    pub results: Vec<SearchResult>,
    /// Collections whose query failed and were counted as empty
    pub failed: Vec<EntityKind>,
}

impl SearchOutcome {
    pub fn state(&self) -> SearchState {
        SearchState::from_results(&self.results)
    }
}

/// Runs one search across the three catalog collections
pub struct SearchDispatcher {
    backend: Arc<dyn DataBackend>,
    config: SearchConfig,
}

impl SearchDispatcher {
    pub fn new(backend: Arc<dyn DataBackend>, config: SearchConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The trimmed query, if long enough to be dispatched, cut to `max_query_len` characters
    pub fn accept(&self, raw: &str) -> Option<String> {
        let query: String = raw.trim().chars().take(self.config.max_query_len).collect();
        let query = query.trim_end();
        if query.is_empty() || query.chars().count() < self.config.min_query_len {
            return None;
        }
        Some(query.to_string())
    }

    /// Query the three collections concurrently and merge what comes back.
    ///
    /// A failing collection is logged and counted as empty.
    pub async fn dispatch(&self, query: &str) -> SearchOutcome {
        let (categories, subcategories, products) = tokio::join!(
            self.fetch::<Category>(Filter::contains("name", query)),
            self.fetch::<Subcategory>(Filter::contains("name", query)),
            self.fetch::<Product>(Filter::Any(vec![
                Filter::contains("name", query),
                Filter::contains("code", query),
            ])),
        );

        let mut outcome = SearchOutcome::default();
        let mut seen = HashSet::new();

        merge(&mut outcome, &mut seen, categories, SearchResult::Category);
        merge(&mut outcome, &mut seen, subcategories, SearchResult::Subcategory);
        merge(&mut outcome, &mut seen, products, SearchResult::Product);

        if outcome.failed.len() == 3 {
            warn!("Every catalog collection failed for query '{}'", query);
        }
        debug!(
            "Search '{}' matched {} rows ({} collections failed)",
            query,
            outcome.results.len(),
            outcome.failed.len()
        );
        outcome
    }

    async fn fetch<T: CatalogEntity>(&self, filter: Filter) -> Option<Vec<T>> {
        let query = SelectQuery::new()
            .filter(filter)
            .order_by("created_at", SortDirection::Asc)
            .limit(self.config.per_collection_limit);

        match self.backend.select(T::KIND.collection(), query).await {
            Ok(records) => Some(
                records
                    .into_iter()
                    .filter_map(|record| match decode::<T>(record) {
                        Ok(entity) => Some(entity),
                        Err(e) => {
                            warn!("Skipping malformed {} record: {}", T::KIND, e);
                            None
                        }
                    })
                    .collect(),
            ),
            Err(e) => {
                warn!("Search over {} failed: {}", T::KIND, e);
                None
            }
        }
    }
}

fn merge<T: CatalogEntity>(
    outcome: &mut SearchOutcome,
    seen: &mut HashSet<(EntityKind, uuid::Uuid)>,
    rows: Option<Vec<T>>,
    wrap: fn(T) -> SearchResult,
) {
    let Some(rows) = rows else {
        outcome.failed.push(T::KIND);
        return;
    };
    for row in rows {
        if seen.insert((T::KIND, row.id())) {
            outcome.results.push(wrap(row));
        }
    }
}
