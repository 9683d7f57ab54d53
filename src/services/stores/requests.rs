use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{Entity, EntityCollection};
use crate::models::{Request, RequestStatus, SerialNumber, StatusLifecycle};
use crate::services::document::{DocumentStore, Query, StoreError};

impl Entity for Request {
    type Status = RequestStatus;

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn status(&self) -> RequestStatus {
        self.status
    }
}

/// Equality filters for request listings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFilter {
    pub user_id: Option<String>,
    pub status: Option<RequestStatus>,
    pub serial_number: Option<SerialNumber>,
}

impl RequestFilter {
    pub fn pending() -> Self {
        Self {
            status: Some(RequestStatus::Pending),
            ..Self::default()
        }
    }

    pub fn owned_by(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    fn to_query(&self) -> Query {
        let mut query = Query::new();
        if let Some(user_id) = &self.user_id {
            query = query.where_eq("userId", user_id.as_str());
        }
        if let Some(status) = self.status {
            query = query.where_eq("status", status.as_str());
        }
        if let Some(serial) = self.serial_number {
            query = query.where_eq("serialNumber", serial.value());
        }
        query
    }
}

/// Care request persistence
#[mockall::automock]
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn save(&self, request: &Request) -> Result<String, StoreError>;

    async fn get(&self, id: &str) -> Result<Request, StoreError>;

    async fn list(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError>;

    async fn update_status(&self, id: &str, status: RequestStatus) -> Result<(), StoreError>;

    fn skipped_records(&self) -> u64;
}

pub struct DocumentRequestStore {
    collection: EntityCollection<Request>,
}

impl DocumentRequestStore {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            collection: EntityCollection::new(store, collection),
        }
    }
}

#[async_trait]
impl RequestStore for DocumentRequestStore {
    async fn save(&self, request: &Request) -> Result<String, StoreError> {
        self.collection.save(request).await
    }

    async fn get(&self, id: &str) -> Result<Request, StoreError> {
        self.collection.get(id).await
    }

    async fn list(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError> {
        self.collection.list(filter.to_query()).await
    }

    async fn update_status(&self, id: &str, status: RequestStatus) -> Result<(), StoreError> {
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
    use chrono::{Duration, NaiveDate, Utc};
    use serde_json::json;

    fn create_request(serial: u64, user_id: &str, age_minutes: i64) -> Request {
        Request {
            id: String::new(),
            serial_number: SerialNumber(serial),
            user_id: user_id.to_string(),
            patient_name: "환자".to_string(),
            guardian_name: "보호자".to_string(),
            patient_condition: String::new(),
            care_start_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            care_end_date: NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
            location: "서울".to_string(),
            patient_phone_number: None,
            guardian_phone_number: "010-0000-0000".to_string(),
            status: RequestStatus::Pending,
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    #[tokio::test]
    async fn test_save_and_get_assigns_id() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        let store = DocumentRequestStore::new(docs.clone(), "care_requests");

        let id = store.save(&create_request(1001, "u1", 0)).await.unwrap();
        let loaded = store.get(&id).await.unwrap();

        assert_eq!(loaded.id, id);
        assert_eq!(loaded.serial_number, SerialNumber(1001));

        // The id lives in the document key only
        let raw = docs.get("care_requests", &id).await.unwrap().unwrap();
        assert!(raw.data.get("id").is_none());
    }

    #[tokio::test]
    async fn test_owner_filter_keeps_newest_first() {
        let store = DocumentRequestStore::new(Arc::new(InMemoryDocumentStore::new()), "care_requests");
        store.save(&create_request(1001, "u1", 30)).await.unwrap();
        store.save(&create_request(1002, "u2", 20)).await.unwrap();
        store.save(&create_request(1003, "u1", 10)).await.unwrap();

        let mine = store.list(&RequestFilter::owned_by("u1")).await.unwrap();
        let serials: Vec<u64> = mine.iter().map(|r| r.serial_number.value()).collect();
        assert_eq!(serials, vec![1003, 1001]);
    }

    #[tokio::test]
    async fn test_update_status_follows_transition_table() {
        let store = DocumentRequestStore::new(Arc::new(InMemoryDocumentStore::new()), "care_requests");
        let id = store.save(&create_request(1001, "u1", 0)).await.unwrap();

        store.update_status(&id, RequestStatus::Matched).await.unwrap();
        // Same status again is accepted
        store.update_status(&id, RequestStatus::Matched).await.unwrap();
        store.update_status(&id, RequestStatus::Completed).await.unwrap();

        let result = store.update_status(&id, RequestStatus::Pending).await;
        assert!(matches!(result, Err(StoreError::InvalidTransition { .. })));
        assert_eq!(store.get(&id).await.unwrap().status, RequestStatus::Completed);
    }

    #[tokio::test]
    async fn test_malformed_record_skipped() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        let store = DocumentRequestStore::new(docs.clone(), "care_requests");
        store.save(&create_request(1001, "u1", 0)).await.unwrap();
        docs.put_raw("care_requests", "broken", json!({"serialNumber": "abc", "createdAt": 1}))
            .await;

        let all = store.list(&RequestFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(store.skipped_records(), 1);
    }
}
