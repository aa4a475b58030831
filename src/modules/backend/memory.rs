use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    check_field, value_text, BackendError, Collection, DataBackend, Filter, OnDelete, Record,
    Relation, SelectQuery, SortDirection,
};

/// Process-local record store
///
/// Tables keep insertion order. Declared [`Relation`]s are enforced the way the
/// SQL schema enforces them: inserts and updates need an existing parent, and
/// deletes either cascade to children or are refused while children remain.
pub struct InMemoryBackend {
    tables: RwLock<HashMap<Collection, Vec<Record>>>,
    relations: Vec<Relation>,
    failing: std::sync::RwLock<HashSet<Collection>>,
    latency: std::sync::RwLock<Option<Duration>>,
}

impl InMemoryBackend {
    pub fn new(relations: Vec<Relation>) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            relations,
            failing: std::sync::RwLock::new(HashSet::new()),
            latency: std::sync::RwLock::new(None),
        }
    }

    /// Make every call touching `collection` fail with `Unavailable`
    #[allow(dead_code)]
    pub fn fail_collection(&self, collection: Collection) {
        if let Ok(mut failing) = self.failing.write() {
            failing.insert(collection);
        }
    }

    /// Delay every call by `latency` (simulated network round trip)
    #[allow(dead_code)]
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut current) = self.latency.write() {
            *current = latency;
        }
    }

    async fn enter(&self, collection: Collection) -> Result<(), BackendError> {
        let latency = self.latency.read().ok().and_then(|l| *l);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failing = self
            .failing
            .read()
            .map(|f| f.contains(&collection))
            .unwrap_or(false);
        if failing {
            return Err(BackendError::Unavailable(format!(
                "{} is unreachable",
                collection.table()
            )));
        }
        Ok(())
    }

    fn check_parents(
        &self,
        tables: &HashMap<Collection, Vec<Record>>,
        collection: Collection,
        record: &Record,
    ) -> Result<(), BackendError> {
        for relation in self.relations.iter().filter(|r| r.child == collection) {
            let Some(parent_id) = record.get(relation.foreign_key).and_then(value_text) else {
                continue;
            };
            let exists = tables
                .get(&relation.parent)
                .map(|rows| rows.iter().any(|row| record_id(row) == Some(parent_id.clone())))
                .unwrap_or(false);
            if !exists {
                return Err(BackendError::ForeignKey(format!(
                    "{}.{} references missing {} {}",
                    collection.table(),
                    relation.foreign_key,
                    relation.parent.table(),
                    parent_id
                )));
            }
        }
        Ok(())
    }

    /// Ids of every row in `collection` referencing `id` through a relation
    fn children_of(
        &self,
        tables: &HashMap<Collection, Vec<Record>>,
        collection: Collection,
        id: &str,
    ) -> Vec<(Relation, String)> {
        let mut children = Vec::new();
        for relation in self.relations.iter().filter(|r| r.parent == collection) {
            if let Some(rows) = tables.get(&relation.child) {
                for row in rows {
                    let references = row.get(relation.foreign_key).and_then(value_text);
                    if references.as_deref() == Some(id) {
                        if let Some(child_id) = record_id(row) {
                            children.push((*relation, child_id));
                        }
                    }
                }
            }
        }
        children
    }

    /// Collect the rows a delete of `(collection, id)` removes, refusing on restrict
    fn plan_delete(
        &self,
        tables: &HashMap<Collection, Vec<Record>>,
        collection: Collection,
        id: &str,
    ) -> Result<Vec<(Collection, String)>, BackendError> {
        let mut plan = vec![(collection, id.to_string())];
        let mut stack = vec![(collection, id.to_string())];

        while let Some((parent, parent_id)) = stack.pop() {
            for (relation, child_id) in self.children_of(tables, parent, &parent_id) {
                match relation.on_delete {
                    OnDelete::Restrict => {
                        return Err(BackendError::ForeignKey(format!(
                            "{} {} is still referenced by {} {}",
                            parent.table(),
                            parent_id,
                            relation.child.table(),
                            child_id
                        )));
                    }
                    OnDelete::Cascade => {
                        plan.push((relation.child, child_id.clone()));
                        stack.push((relation.child, child_id));
                    }
                }
            }
        }
        Ok(plan)
    }
}

fn record_id(record: &Record) -> Option<String> {
    record.get("id").and_then(value_text)
}

fn matches(record: &Record, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(field, value) => {
            let actual = record.get(field).and_then(value_text);
            actual == value_text(value)
        }
        Filter::Contains(field, needle) => record
            .get(field)
            .and_then(value_text)
            .map(|text| text.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(false),
        Filter::Any(filters) => filters.iter().any(|f| matches(record, f)),
        Filter::All(filters) => filters.iter().all(|f| matches(record, f)),
    }
}

/// Ordering of two JSON values: nulls first, timestamps chronologically
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (
                DateTime::<FixedOffset>::parse_from_rfc3339(x),
                DateTime::<FixedOffset>::parse_from_rfc3339(y),
            ) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
impl DataBackend for InMemoryBackend {
    async fn select(
        &self,
        collection: Collection,
        query: SelectQuery,
    ) -> Result<Vec<Record>, BackendError> {
        if let Some(filter) = &query.filter {
            for field in filter.fields() {
                check_field(field)?;
            }
        }
        self.enter(collection).await?;

        let tables = self.tables.read().await;
        let mut rows: Vec<Record> = tables
            .get(&collection)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filter.as_ref().map_or(true, |f| matches(row, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            check_field(&order.field)?;
            // stable sort: insertion order breaks ties
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(&order.field), b.get(&order.field));
                match order.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(
        &self,
        collection: Collection,
        filter: Option<Filter>,
    ) -> Result<i64, BackendError> {
        let mut query = SelectQuery::new();
        query.filter = filter;
        let rows = self.select(collection, query).await?;
        Ok(rows.len() as i64)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>, BackendError> {
        self.enter(collection).await?;

        let tables = self.tables.read().await;
        Ok(tables.get(&collection).and_then(|rows| {
            rows.iter()
                .find(|row| record_id(row).as_deref() == Some(id))
                .cloned()
        }))
    }

    async fn insert(
        &self,
        collection: Collection,
        record: Record,
    ) -> Result<Record, BackendError> {
        for field in record.keys() {
            check_field(field)?;
        }
        self.enter(collection).await?;

        let id = record_id(&record).ok_or_else(|| {
            BackendError::Storage(format!("{} record without id", collection.table()))
        })?;

        let mut tables = self.tables.write().await;
        self.check_parents(&tables, collection, &record)?;

        let rows = tables.entry(collection).or_default();
        if rows.iter().any(|row| record_id(row).as_deref() == Some(id.as_str())) {
            return Err(BackendError::Duplicate(format!(
                "{} {} already exists",
                collection.table(),
                id
            )));
        }
        rows.push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Record,
    ) -> Result<Option<Record>, BackendError> {
        for field in patch.keys() {
            check_field(field)?;
        }
        self.enter(collection).await?;

        let mut tables = self.tables.write().await;
        let Some(current) = tables.get(&collection).and_then(|rows| {
            rows.iter()
                .find(|row| record_id(row).as_deref() == Some(id))
                .cloned()
        }) else {
            return Ok(None);
        };

        let mut updated = current;
        for (field, value) in patch {
            updated.insert(field, value);
        }
        self.check_parents(&tables, collection, &updated)?;

        if let Some(row) = tables.get_mut(&collection).and_then(|rows| {
            rows.iter_mut()
                .find(|row| record_id(row).as_deref() == Some(id))
        }) {
            *row = updated.clone();
        }
        Ok(Some(updated))
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, BackendError> {
        self.enter(collection).await?;

        let mut tables = self.tables.write().await;
        let exists = tables
            .get(&collection)
            .map(|rows| rows.iter().any(|row| record_id(row).as_deref() == Some(id)))
            .unwrap_or(false);
        if !exists {
            return Ok(false);
        }

        let plan = self.plan_delete(&tables, collection, id)?;
        for (target, target_id) in plan {
            if let Some(rows) = tables.get_mut(&target) {
                rows.retain(|row| record_id(row).as_deref() != Some(target_id.as_str()));
            }
        }
        Ok(true)
    }
}
