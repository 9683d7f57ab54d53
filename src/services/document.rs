use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur when interacting with the document store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to decode document {id}: {reason}")]
    Decode { id: String, reason: String },

    #[error("Failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a rejected conditional write
#[derive(Debug, Error)]
pub enum CasError {
    #[error("Document was modified by another writer")]
    Conflict,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Stored document with its body and write version
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
    pub version: u64,
}

/// Equality filter on a top-level document field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

/// Equality-filtered query sorted by one field, newest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<FieldFilter>,
    pub order_by_desc: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.order_by_desc = Some(field.into());
        self
    }

    /// Whether a document body satisfies every equality filter
    pub fn matches(&self, data: &Value) -> bool {
        self.filters
            .iter()
            .all(|f| data.get(&f.field) == Some(&f.value))
    }
}

/// Persistent document store
///
/// `compare_and_swap` is the transaction primitive: it writes `data` only
/// when the stored version still equals `expected_version` (`None` meaning
/// the document must not exist yet) and signals `CasError::Conflict`
/// otherwise.
#[mockall::automock]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Insert a new document and return its generated id
    async fn insert(&self, collection: &str, data: Value) -> Result<String, StoreError>;

    /// Merge `fields` into an existing document
    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError>;

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Conditionally replace a document, returning the new version
    async fn compare_and_swap(
        &self,
        collection: &str,
        id: &str,
        expected_version: Option<u64>,
        data: Value,
    ) -> Result<u64, CasError>;

    async fn health_check(&self) -> Result<bool, StoreError>;
}
