use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgArguments;
use sqlx::types::Json;
use sqlx::{Arguments, FromRow, PgPool};
use uuid::Uuid;

use super::{Direction, Document, DocumentStore, Filter, ID_FIELD, Query, StoreError};

/// Documents live in a single JSONB table keyed by (collection, id).
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct DocumentRow {
    id: String,
    data: Json<Map<String, Value>>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document::new(row.id, row.data.0)
    }
}

/// Positional SQL arguments with the matching `$n` placeholders.
struct Params {
    args: PgArguments,
    next: usize,
}

impl Params {
    fn new() -> Self {
        Self {
            args: PgArguments::default(),
            next: 1,
        }
    }

    fn push<'q, T>(&mut self, value: T) -> Result<String, StoreError>
    where
        T: 'q + sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    {
        self.args
            .add(value)
            .map_err(|e| StoreError::Database(sqlx::Error::Encode(e)))?;
        let placeholder = format!("${}", self.next);
        self.next += 1;
        Ok(placeholder)
    }
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data JSONB NOT NULL DEFAULT '{}'::jsonb,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("documents table ready");
        Ok(())
    }

    /// `collection = ..` plus one strict equality per filter field. A missing
    /// field compares as JSON null, and arrays or objects must match whole,
    /// the same as [`Filter::matches`].
    fn where_clause(
        params: &mut Params,
        collection: &str,
        filter: &Filter,
    ) -> Result<String, StoreError> {
        let mut sql = format!("collection = {}", params.push(collection.to_string())?);
        for (field, value) in filter.conditions() {
            let lhs = Self::sort_expr(params, field)?;
            let rhs = params.push(Json(value.clone()))?;
            sql.push_str(&format!(" AND {lhs} = {rhs}::jsonb"));
        }
        Ok(sql)
    }

    fn sort_expr(params: &mut Params, field: &str) -> Result<String, StoreError> {
        if field == ID_FIELD {
            return Ok("to_jsonb(id)".to_string());
        }
        Ok(format!(
            "COALESCE(data -> {}, 'null'::jsonb)",
            params.push(field.to_string())?
        ))
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let mut params = Params::new();
        let mut sql = format!(
            "SELECT id, data FROM documents WHERE {}",
            Self::where_clause(&mut params, &query.collection, &query.filter)?
        );
        let sort = Self::sort_expr(&mut params, &query.order_by.field)?;
        let (cmp, dir) = match query.order_by.direction {
            Direction::Asc => (">", "ASC"),
            Direction::Desc => ("<", "DESC"),
        };

        if let Some(cursor) = &query.start_after {
            let key = params.push(Json(cursor.key().clone()))?;
            let id = params.push(cursor.id().to_string())?;
            sql.push_str(&format!(" AND ({sort}, id) {cmp} ({key}::jsonb, {id})"));
        }

        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        sql.push_str(&format!(
            " ORDER BY {sort} {dir}, id {dir} LIMIT {}",
            params.push(limit)?
        ));

        tracing::debug!("document query: {}", sql);
        let rows = sqlx::query_as_with::<_, DocumentRow, _>(&sql, params.args)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut params = Params::new();
        let sql = format!(
            "SELECT COUNT(*) FROM documents WHERE {}",
            Self::where_clause(&mut params, collection, filter)?
        );
        let count = sqlx::query_scalar_with::<_, i64, _>(&sql, params.args)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, data FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Document::from))
    }

    async fn insert(
        &self,
        collection: &str,
        mut data: Map<String, Value>,
    ) -> Result<Document, StoreError> {
        let id = match data.remove(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => id,
            Some(other) if !other.is_null() => {
                return Err(StoreError::InvalidDocument(format!(
                    "id must be a string, got {other}"
                )));
            }
            _ => Uuid::new_v4().to_string(),
        };

        let result = sqlx::query_as::<_, DocumentRow>(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            RETURNING id, data
            "#,
        )
        .bind(collection)
        .bind(&id)
        .bind(Json(&data))
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row.into()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::InvalidDocument(format!("duplicate id {id}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        mut data: Map<String, Value>,
    ) -> Result<Option<Document>, StoreError> {
        data.remove(ID_FIELD);
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            UPDATE documents
            SET data = data || $3
            WHERE collection = $1 AND id = $2
            RETURNING id, data
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(&data))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Document::from))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_fields_compare_whole_values() {
        let mut params = Params::new();
        let filter = Filter::new().eq("tags", json!(["a"]));
        let sql = PgDocumentStore::where_clause(&mut params, "products", &filter).unwrap();
        assert_eq!(
            sql,
            "collection = $1 AND COALESCE(data -> $2, 'null'::jsonb) = $3::jsonb"
        );
        assert_eq!(params.next, 4);
    }

    #[test]
    fn id_filter_reads_the_column() {
        let mut params = Params::new();
        let filter = Filter::new().eq(ID_FIELD, "p1");
        let sql = PgDocumentStore::where_clause(&mut params, "products", &filter).unwrap();
        assert_eq!(sql, "collection = $1 AND to_jsonb(id) = $2::jsonb");
    }

    #[test]
    fn empty_filter_only_scopes_the_collection() {
        let mut params = Params::new();
        let sql = PgDocumentStore::where_clause(&mut params, "brands", &Filter::new()).unwrap();
        assert_eq!(sql, "collection = $1");
    }
}
