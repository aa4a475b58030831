//! Data backend boundary
//!
//! Every feature talks to persistence through [`DataBackend`]: collection-scoped
//! record CRUD plus filtered selects with case-insensitive substring matching.
//! Records cross the boundary as JSON objects and are decoded into typed models
//! by the features.
//!
//! Two implementations are provided:
//! - [`PgBackend`]: PostgreSQL via sqlx, foreign keys in the schema, restrict checked on delete
//! - [`InMemoryBackend`]: process-local tables honoring the same [`Relation`]s

mod memory;
mod postgres;
mod query;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use memory::InMemoryBackend;
pub use postgres::PgBackend;
pub use query::{escape_like, value_text, Filter, OrderBy, SelectQuery, SortDirection};

use crate::shared::validation::IDENTIFIER_REGEX;

/// A backend record: one JSON object per row
pub type Record = serde_json::Map<String, Value>;

/// Collections hosted by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Categories,
    Subcategories,
    Products,
    Profiles,
    Messages,
}

impl Collection {
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Categories => "categories",
            Collection::Subcategories => "subcategories",
            Collection::Products => "products",
            Collection::Profiles => "profiles",
            Collection::Messages => "messages",
        }
    }
}

/// What happens to children when their parent row is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    Restrict,
}

/// Foreign-key relation between two collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub child: Collection,
    pub foreign_key: &'static str,
    pub parent: Collection,
    pub on_delete: OnDelete,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid field name: {0}")]
    InvalidField(String),

    /// A referenced parent is missing, or a delete is blocked by children
    #[error("Foreign key violation: {0}")]
    ForeignKey(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Record decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DataBackend: Send + Sync {
    async fn select(
        &self,
        collection: Collection,
        query: SelectQuery,
    ) -> Result<Vec<Record>, BackendError>;

    /// Number of rows matching the filter (ignores ordering and paging)
    async fn count(
        &self,
        collection: Collection,
        filter: Option<Filter>,
    ) -> Result<i64, BackendError>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>, BackendError>;

    /// Insert a complete record (including `id` and `created_at`)
    async fn insert(&self, collection: Collection, record: Record)
        -> Result<Record, BackendError>;

    /// Apply `patch` to the record; `None` when the record does not exist
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Record,
    ) -> Result<Option<Record>, BackendError>;

    /// Delete a record; `false` when it did not exist
    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, BackendError>;
}

/// Decode a backend record into a typed model
pub fn decode<T: DeserializeOwned>(record: Record) -> Result<T, BackendError> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Encode a typed model into a backend record
pub fn encode<T: Serialize>(value: &T) -> Result<Record, BackendError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::Storage(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

/// Reject field names that are not plain lowercase identifiers
pub(crate) fn check_field(field: &str) -> Result<&str, BackendError> {
    if IDENTIFIER_REGEX.is_match(field) {
        Ok(field)
    } else {
        Err(BackendError::InvalidField(field.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        id: String,
        name: String,
    }

    #[test]
    fn test_encode_decode_model() {
        let row = Row {
            id: "1".to_string(),
            name: "Visserie".to_string(),
        };
        let record = encode(&row).unwrap();
        assert_eq!(record.get("name"), Some(&Value::String("Visserie".into())));
        assert_eq!(decode::<Row>(record).unwrap(), row);
    }

    #[test]
    fn test_encode_rejects_non_objects() {
        assert!(matches!(encode(&42), Err(BackendError::Storage(_))));
    }

    #[test]
    fn test_check_field() {
        assert!(check_field("category_id").is_ok());
        assert!(check_field("name").is_ok());
        assert!(check_field("name; DROP TABLE x").is_err());
        assert!(check_field("Name").is_err());
        assert!(check_field("").is_err());
    }
}
