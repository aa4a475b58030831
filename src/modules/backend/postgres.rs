use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    check_field, escape_like, value_text, BackendError, Collection, DataBackend, Filter, OnDelete,
    Record, Relation, SelectQuery, SortDirection,
};

/// PostgreSQL-backed record store
///
/// Rows are projected with `to_jsonb` and written through `jsonb_populate_record`,
/// so one set of queries serves every collection. Foreign keys live in the
/// schema (`migrations/`) and cascade; `Restrict` relations are checked inside
/// the delete itself.
pub struct PgBackend {
    pool: PgPool,
    relations: Vec<Relation>,
}

/// How an equality on a column is bound so that its index stays usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Uuid,
    Boolean,
    Text,
    /// Anything else is compared by its text form
    Other,
}

fn column_type(collection: Collection, field: &str) -> ColumnType {
    match (collection, field) {
        (Collection::Profiles, "id") => ColumnType::Text,
        (_, "id" | "category_id" | "subcategory_id") => ColumnType::Uuid,
        (Collection::Profiles, "verified") => ColumnType::Boolean,
        (_, "name" | "code" | "email" | "status" | "role") => ColumnType::Text,
        _ => ColumnType::Other,
    }
}

impl PgBackend {
    pub fn new(pool: PgPool, relations: Vec<Relation>) -> Self {
        Self { pool, relations }
    }

    /// `t.{field} = <value>`, bound as the column's own type.
    ///
    /// A value that cannot be of that type matches nothing.
    fn push_eq(
        builder: &mut QueryBuilder<'_, Postgres>,
        collection: Collection,
        field: &str,
        text: String,
    ) {
        match column_type(collection, field) {
            ColumnType::Uuid => match Uuid::parse_str(&text) {
                Ok(id) => {
                    builder.push(format!("t.{} = ", field));
                    builder.push_bind(id);
                }
                Err(_) => {
                    builder.push("FALSE");
                }
            },
            ColumnType::Boolean => match text.parse::<bool>() {
                Ok(flag) => {
                    builder.push(format!("t.{} = ", field));
                    builder.push_bind(flag);
                }
                Err(_) => {
                    builder.push("FALSE");
                }
            },
            ColumnType::Text => {
                builder.push(format!("t.{} = ", field));
                builder.push_bind(text);
            }
            ColumnType::Other => {
                builder.push(format!("t.{}::text = ", field));
                builder.push_bind(text);
            }
        }
    }

    fn push_filter(
        builder: &mut QueryBuilder<'_, Postgres>,
        collection: Collection,
        filter: &Filter,
    ) -> Result<(), BackendError> {
        match filter {
            Filter::Eq(field, value) => {
                let field = check_field(field)?;
                match value_text(value) {
                    Some(text) => Self::push_eq(builder, collection, field, text),
                    None => {
                        builder.push(format!("t.{} IS NULL", field));
                    }
                }
            }
            Filter::Contains(field, needle) => {
                let field = check_field(field)?;
                builder.push(format!("t.{}::text ILIKE ", field));
                builder.push_bind(format!("%{}%", escape_like(needle)));
                builder.push(" ESCAPE '\\'");
            }
            Filter::Any(filters) => {
                Self::push_group(builder, collection, filters, " OR ", "FALSE")?
            }
            Filter::All(filters) => {
                Self::push_group(builder, collection, filters, " AND ", "TRUE")?
            }
        }
        Ok(())
    }

    fn push_group(
        builder: &mut QueryBuilder<'_, Postgres>,
        collection: Collection,
        filters: &[Filter],
        separator: &str,
        empty: &str,
    ) -> Result<(), BackendError> {
        if filters.is_empty() {
            builder.push(empty);
            return Ok(());
        }
        builder.push("(");
        for (i, filter) in filters.iter().enumerate() {
            if i > 0 {
                builder.push(separator);
            }
            Self::push_filter(builder, collection, filter)?;
        }
        builder.push(")");
        Ok(())
    }

    fn push_where(
        builder: &mut QueryBuilder<'_, Postgres>,
        collection: Collection,
        filter: Option<&Filter>,
    ) -> Result<(), BackendError> {
        if let Some(filter) = filter {
            builder.push(" WHERE ");
            Self::push_filter(builder, collection, filter)?;
        }
        Ok(())
    }

    fn into_record(value: Value) -> Result<Record, BackendError> {
        match value {
            Value::Object(map) => Ok(map),
            other => Err(BackendError::Storage(format!(
                "row is not a JSON object: {}",
                other
            ))),
        }
    }
}

/// `AND NOT EXISTS (...)` for every restricting child of `collection`
fn push_restrict_guard(
    builder: &mut QueryBuilder<'_, Postgres>,
    relations: &[Relation],
    collection: Collection,
) {
    for relation in relations
        .iter()
        .filter(|r| r.parent == collection && r.on_delete == OnDelete::Restrict)
    {
        builder.push(format!(
            " AND NOT EXISTS (SELECT 1 FROM {} c WHERE c.{} = t.id)",
            relation.child.table(),
            relation.foreign_key
        ));
    }
}

/// Map driver errors onto the backend taxonomy
fn map_sqlx_error(collection: Collection, err: sqlx::Error) -> BackendError {
    match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            BackendError::ForeignKey(format!("{}: {}", collection.table(), db.message()))
        }
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            BackendError::Duplicate(format!("{}: {}", collection.table(), db.message()))
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            BackendError::Unavailable(err.to_string())
        }
        _ => BackendError::Database(err),
    }
}

#[async_trait]
impl DataBackend for PgBackend {
    async fn select(
        &self,
        collection: Collection,
        query: SelectQuery,
    ) -> Result<Vec<Record>, BackendError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT to_jsonb(t) FROM {} t",
            collection.table()
        ));
        Self::push_where(&mut builder, collection, query.filter.as_ref())?;

        if let Some(order) = &query.order {
            let field = check_field(&order.field)?;
            let direction = match order.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            // id keeps the order stable for equal sort keys
            builder.push(format!(" ORDER BY t.{} {}, t.id ASC", field, direction));
        }
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            builder.push(" OFFSET ");
            builder.push_bind(offset as i64);
        }

        let rows: Vec<Json<Value>> = builder
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to select from {}: {:?}", collection.table(), e);
                map_sqlx_error(collection, e)
            })?;

        rows.into_iter().map(|row| Self::into_record(row.0)).collect()
    }

    async fn count(
        &self,
        collection: Collection,
        filter: Option<Filter>,
    ) -> Result<i64, BackendError> {
        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {} t", collection.table()));
        Self::push_where(&mut builder, collection, filter.as_ref())?;

        builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to count {}: {:?}", collection.table(), e);
                map_sqlx_error(collection, e)
            })
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>, BackendError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT to_jsonb(t) FROM {} t WHERE ",
            collection.table()
        ));
        Self::push_eq(&mut builder, collection, "id", id.to_string());

        let row: Option<Json<Value>> = builder
            .build_query_scalar()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to get {} {}: {:?}", collection.table(), id, e);
                map_sqlx_error(collection, e)
            })?;

        row.map(|r| Self::into_record(r.0)).transpose()
    }

    async fn insert(
        &self,
        collection: Collection,
        record: Record,
    ) -> Result<Record, BackendError> {
        for field in record.keys() {
            check_field(field)?;
        }
        let table = collection.table();
        let sql = format!(
            "INSERT INTO {table} AS t SELECT * FROM jsonb_populate_record(NULL::{table}, $1) RETURNING to_jsonb(t)"
        );

        let row: Json<Value> = sqlx::query_scalar(&sql)
            .bind(Json(Value::Object(record)))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert into {}: {:?}", table, e);
                map_sqlx_error(collection, e)
            })?;

        Self::into_record(row.0)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Record,
    ) -> Result<Option<Record>, BackendError> {
        if patch.is_empty() {
            return self.get(collection, id).await;
        }

        let table = collection.table();
        let assignments = patch
            .keys()
            .map(|field| check_field(field).map(|f| format!("{f} = r.{f}")))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "UPDATE {table} AS t SET {assignments} FROM jsonb_populate_record(NULL::{table}, "
        ));
        builder.push_bind(Json(Value::Object(patch)));
        builder.push(") AS r WHERE ");
        Self::push_eq(&mut builder, collection, "id", id.to_string());
        builder.push(" RETURNING to_jsonb(t)");

        let row: Option<Json<Value>> = builder
            .build_query_scalar()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update {} {}: {:?}", table, id, e);
                map_sqlx_error(collection, e)
            })?;

        row.map(|r| Self::into_record(r.0)).transpose()
    }

    /// The parent row is locked first, so a child inserted concurrently either
    /// commits before the restrict check sees it or fails its foreign key
    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, BackendError> {
        let table = collection.table();
        let fail = |e: sqlx::Error| {
            tracing::error!("Failed to delete {} {}: {:?}", table, id, e);
            map_sqlx_error(collection, e)
        };

        let mut tx = self.pool.begin().await.map_err(fail)?;

        let mut lock = QueryBuilder::<Postgres>::new(format!("SELECT 1 FROM {} t WHERE ", table));
        Self::push_eq(&mut lock, collection, "id", id.to_string());
        lock.push(" FOR UPDATE");
        let locked: Option<i32> = lock
            .build_query_scalar()
            .fetch_optional(&mut *tx)
            .await
            .map_err(fail)?;
        if locked.is_none() {
            return Ok(false);
        }

        let mut delete = QueryBuilder::<Postgres>::new(format!("DELETE FROM {} t WHERE ", table));
        Self::push_eq(&mut delete, collection, "id", id.to_string());
        push_restrict_guard(&mut delete, &self.relations, collection);
        let result = delete.build().execute(&mut *tx).await.map_err(fail)?;

        if result.rows_affected() == 0 {
            return Err(BackendError::ForeignKey(format!(
                "{} {} is still referenced",
                table, id
            )));
        }

        tx.commit().await.map_err(fail)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn where_clause(collection: Collection, filter: Filter) -> String {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM x t");
        PgBackend::push_where(&mut builder, collection, Some(&filter)).unwrap();
        builder.sql().to_string()
    }

    fn relation(on_delete: OnDelete) -> Vec<Relation> {
        vec![
            Relation {
                child: Collection::Subcategories,
                foreign_key: "category_id",
                parent: Collection::Categories,
                on_delete,
            },
            Relation {
                child: Collection::Products,
                foreign_key: "subcategory_id",
                parent: Collection::Subcategories,
                on_delete,
            },
        ]
    }

    #[test]
    fn test_key_lookups_compare_uncast_columns() {
        let id = Uuid::new_v4().to_string();

        let sql = where_clause(Collection::Subcategories, Filter::eq("category_id", id.clone()));
        assert_eq!(sql, "SELECT 1 FROM x t WHERE t.category_id = $1");

        let sql = where_clause(Collection::Products, Filter::eq("id", id));
        assert_eq!(sql, "SELECT 1 FROM x t WHERE t.id = $1");

        let sql = where_clause(Collection::Profiles, Filter::eq("id", "auth0|42"));
        assert_eq!(sql, "SELECT 1 FROM x t WHERE t.id = $1");

        let sql = where_clause(Collection::Profiles, Filter::eq("verified", true));
        assert_eq!(sql, "SELECT 1 FROM x t WHERE t.verified = $1");
    }

    #[test]
    fn test_malformed_uuid_matches_nothing() {
        let sql = where_clause(Collection::Products, Filter::eq("subcategory_id", "not-a-uuid"));
        assert_eq!(sql, "SELECT 1 FROM x t WHERE FALSE");
    }

    #[test]
    fn test_null_and_substring_filters() {
        let sql = where_clause(
            Collection::Products,
            Filter::Any(vec![
                Filter::contains("name", "vis"),
                Filter::Eq("code".to_string(), Value::Null),
            ]),
        );
        assert_eq!(
            sql,
            "SELECT 1 FROM x t WHERE (t.name::text ILIKE $1 ESCAPE '\\' OR t.code IS NULL)"
        );
    }

    #[test]
    fn test_restrict_guard_only_under_restrict() {
        let mut builder = QueryBuilder::<Postgres>::new("DELETE FROM categories t WHERE t.id = $1");
        push_restrict_guard(&mut builder, &relation(OnDelete::Restrict), Collection::Categories);
        assert_eq!(
            builder.sql(),
            "DELETE FROM categories t WHERE t.id = $1 \
             AND NOT EXISTS (SELECT 1 FROM subcategories c WHERE c.category_id = t.id)"
        );

        let mut builder = QueryBuilder::<Postgres>::new("DELETE FROM categories t WHERE t.id = $1");
        push_restrict_guard(&mut builder, &relation(OnDelete::Cascade), Collection::Categories);
        assert_eq!(builder.sql(), "DELETE FROM categories t WHERE t.id = $1");

        // products have no children
        let mut builder = QueryBuilder::<Postgres>::new("DELETE FROM products t WHERE t.id = $1");
        push_restrict_guard(&mut builder, &relation(OnDelete::Restrict), Collection::Products);
        assert_eq!(builder.sql(), "DELETE FROM products t WHERE t.id = $1");
    }
}
