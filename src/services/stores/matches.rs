use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::{Entity, EntityCollection};
use crate::models::{Match, MatchStatus, SerialNumber, StatusLifecycle};
use crate::services::document::{DocumentStore, Query, StoreError};

impl Entity for Match {
    type Status = MatchStatus;

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn status(&self) -> MatchStatus {
        self.status
    }

    fn status_side_fields() -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            "updatedAt".to_string(),
            Value::from(Utc::now().timestamp_millis()),
        );
        fields
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFilter {
    pub status: Option<MatchStatus>,
    pub request_serial_number: Option<SerialNumber>,
    pub provider_serial_number: Option<SerialNumber>,
}

impl MatchFilter {
    fn to_query(&self) -> Query {
        let mut query = Query::new();
        if let Some(status) = self.status {
            query = query.where_eq("status", status.as_str());
        }
        if let Some(serial) = self.request_serial_number {
            query = query.where_eq("requestSerialNumber", serial.value());
        }
        if let Some(serial) = self.provider_serial_number {
            query = query.where_eq("providerSerialNumber", serial.value());
        }
        query
    }
}

/// Match persistence
#[mockall::automock]
#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn save(&self, record: &Match) -> Result<String, StoreError>;

    async fn get(&self, id: &str) -> Result<Match, StoreError>;

    async fn list(&self, filter: &MatchFilter) -> Result<Vec<Match>, StoreError>;

    async fn update_status(&self, id: &str, status: MatchStatus) -> Result<(), StoreError>;

    fn skipped_records(&self) -> u64;
}

pub struct DocumentMatchStore {
    collection: EntityCollection<Match>,
}

impl DocumentMatchStore {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            collection: EntityCollection::new(store, collection),
        }
    }
}

#[async_trait]
impl MatchStore for DocumentMatchStore {
    async fn save(&self, record: &Match) -> Result<String, StoreError> {
        self.collection.save(record).await
    }

    async fn get(&self, id: &str) -> Result<Match, StoreError> {
        self.collection.get(id).await
    }

    async fn list(&self, filter: &MatchFilter) -> Result<Vec<Match>, StoreError> {
        self.collection.list(filter.to_query()).await
    }

    async fn update_status(&self, id: &str, status: MatchStatus) -> Result<(), StoreError> {
        self.collection.update_status(id, status).await
    }

    fn skipped_records(&self) -> u64 {
        self.collection.skipped_records()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::InMemoryDocumentStore;

    fn create_match(serial: u64, request_serial: u64) -> Match {
        let now = Utc::now() - chrono::Duration::seconds(5);
        Match {
            id: String::new(),
            serial_number: SerialNumber(serial),
            request_serial_number: SerialNumber(request_serial),
            provider_serial_number: SerialNumber(2001),
            status: MatchStatus::Pending,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_status_update_refreshes_updated_at() {
        let store = DocumentMatchStore::new(Arc::new(InMemoryDocumentStore::new()), "matches");
        let original = create_match(30_000_000_001, 1001);
        let id = store.save(&original).await.unwrap();

        store.update_status(&id, MatchStatus::Confirmed).await.unwrap();

        let loaded = store.get(&id).await.unwrap();
        assert_eq!(loaded.status, MatchStatus::Confirmed);
        assert!(loaded.updated_at > original.updated_at);
        assert_eq!(loaded.created_at.timestamp_millis(), original.created_at.timestamp_millis());
    }

    #[tokio::test]
    async fn test_filter_by_request_serial() {
        let store = DocumentMatchStore::new(Arc::new(InMemoryDocumentStore::new()), "matches");
        store.save(&create_match(30_000_000_001, 1001)).await.unwrap();
        store.save(&create_match(30_000_000_002, 1002)).await.unwrap();

        let filter = MatchFilter {
            request_serial_number: Some(SerialNumber(1002)),
            ..MatchFilter::default()
        };
        let listed = store.list(&filter).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].serial_number, SerialNumber(30_000_000_002));
    }

    #[tokio::test]
    async fn test_cancelled_match_is_final() {
        let store = DocumentMatchStore::new(Arc::new(InMemoryDocumentStore::new()), "matches");
        let id = store.save(&create_match(30_000_000_001, 1001)).await.unwrap();
        store.update_status(&id, MatchStatus::Cancelled).await.unwrap();

        let result = store.update_status(&id, MatchStatus::Confirmed).await;
        assert!(matches!(result, Err(StoreError::InvalidTransition { .. })));
    }
}
