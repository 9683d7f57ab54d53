use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;

use super::document::{CasError, Document, DocumentStore, Query, StoreError};

/// PostgreSQL-backed document store
///
/// Every collection lives in one `documents` table keyed by
/// `(collection, id)`. The JSONB body holds the entity and `version` is
/// bumped on every write, which is what `compare_and_swap` checks against.
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Create a new store from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new store from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, StoreError> {
        tracing::info!("Connecting to PostgreSQL document store");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Equality filters collapse into one JSONB containment object
fn containment(query: &Query) -> Value {
    let mut object = Map::new();
    for filter in &query.filters {
        object.insert(filter.field.clone(), filter.value.clone());
    }
    Value::Object(object)
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let query = r#"
            SELECT id, data, version
            FROM documents
            WHERE collection = $1 AND id = $2
        "#;

        let row = sqlx::query(query)
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Document {
            id: row.get("id"),
            data: row.get("data"),
            version: row.get::<i64, _>("version") as u64,
        }))
    }

    async fn insert(&self, collection: &str, data: Value) -> Result<String, StoreError> {
        let query = r#"
            INSERT INTO documents (collection, id, data, version, updated_at)
            VALUES ($1, $2, $3, 1, NOW())
        "#;

        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(query)
            .bind(collection)
            .bind(&id)
            .bind(&data)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Inserted document {}/{}", collection, id);
        Ok(id)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let query = r#"
            UPDATE documents
            SET data = data || $3, version = version + 1, updated_at = NOW()
            WHERE collection = $1 AND id = $2
        "#;

        let result = sqlx::query(query)
            .bind(collection)
            .bind(id)
            .bind(Value::Object(fields))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("{}/{}", collection, id)));
        }
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let sql = match query.order_by_desc {
            Some(_) => {
                r#"
                SELECT id, data, version
                FROM documents
                WHERE collection = $1 AND data @> $2
                ORDER BY data -> $3 DESC NULLS LAST
                "#
            }
            None => {
                r#"
                SELECT id, data, version
                FROM documents
                WHERE collection = $1 AND data @> $2
                "#
            }
        };

        let mut statement = sqlx::query(sql).bind(collection).bind(containment(query));
        if let Some(field) = &query.order_by_desc {
            statement = statement.bind(field);
        }

        let rows = statement.fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|row| Document {
                id: row.get("id"),
                data: row.get("data"),
                version: row.get::<i64, _>("version") as u64,
            })
            .collect())
    }

    async fn compare_and_swap(
        &self,
        collection: &str,
        id: &str,
        expected_version: Option<u64>,
        data: Value,
    ) -> Result<u64, CasError> {
        let result = match expected_version {
            None => {
                let query = r#"
                    INSERT INTO documents (collection, id, data, version, updated_at)
                    VALUES ($1, $2, $3, 1, NOW())
                    ON CONFLICT (collection, id) DO NOTHING
                "#;
                sqlx::query(query)
                    .bind(collection)
                    .bind(id)
                    .bind(&data)
                    .execute(&self.pool)
                    .await
            }
            Some(version) => {
                let query = r#"
                    UPDATE documents
                    SET data = $3, version = version + 1, updated_at = NOW()
                    WHERE collection = $1 AND id = $2 AND version = $4
                "#;
                sqlx::query(query)
                    .bind(collection)
                    .bind(id)
                    .bind(&data)
                    .bind(version as i64)
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(StoreError::from)?;

        if result.rows_affected() == 0 {
            return Err(CasError::Conflict);
        }

        Ok(expected_version.map(|v| v + 1).unwrap_or(1))
    }

    /// Health check for the database connection
    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}
