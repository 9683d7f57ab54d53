use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{Entity, EntityCollection};
use crate::models::{Provider, ProviderStatus, StatusLifecycle};
use crate::services::document::{DocumentStore, Query, StoreError};

impl Entity for Provider {
    type Status = ProviderStatus;

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn status(&self) -> ProviderStatus {
        self.status
    }
}

/// Provider listing filters
///
/// `user_id` and `status` go to the document query. `region`, `certificate`
/// and `experience` are applied to decoded providers, keeping the listing
/// order. Empty values count as unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFilter {
    pub user_id: Option<String>,
    pub status: Option<ProviderStatus>,
    /// Exact member of `available_regions`
    pub region: Option<String>,
    /// Substring of `certificates`
    pub certificate: Option<String>,
    /// Equal to `experience`
    pub experience: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ProviderFilter {
    /// Drop the region, certificate and experience filters
    pub fn clear_attributes(&mut self) {
        self.region = None;
        self.certificate = None;
        self.experience = None;
    }

    pub fn accepts(&self, provider: &Provider) -> bool {
        non_empty(&self.region).map_or(true, |region| provider.serves(region))
            && non_empty(&self.certificate)
                .map_or(true, |certificate| provider.certificates.contains(certificate))
            && non_empty(&self.experience).map_or(true, |experience| provider.experience == experience)
    }

    fn to_query(&self) -> Query {
        let mut query = Query::new();
        if let Some(user_id) = &self.user_id {
            query = query.where_eq("userId", user_id.as_str());
        }
        if let Some(status) = self.status {
            query = query.where_eq("status", status.as_str());
        }
        query
    }
}

/// Caregiver persistence
#[mockall::automock]
#[async_trait]
pub trait ProviderStore: Send + Sync {
    async fn save(&self, provider: &Provider) -> Result<String, StoreError>;

    async fn get(&self, id: &str) -> Result<Provider, StoreError>;

    async fn list(&self, filter: &ProviderFilter) -> Result<Vec<Provider>, StoreError>;

    async fn update_status(&self, id: &str, status: ProviderStatus) -> Result<(), StoreError>;

    fn skipped_records(&self) -> u64;
}

pub struct DocumentProviderStore {
    collection: EntityCollection<Provider>,
}

impl DocumentProviderStore {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            collection: EntityCollection::new(store, collection),
        }
    }
}

#[async_trait]
impl ProviderStore for DocumentProviderStore {
    async fn save(&self, provider: &Provider) -> Result<String, StoreError> {
        self.collection.save(provider).await
    }

    async fn get(&self, id: &str) -> Result<Provider, StoreError> {
        self.collection.get(id).await
    }

    async fn list(&self, filter: &ProviderFilter) -> Result<Vec<Provider>, StoreError> {
        let mut providers = self.collection.list(filter.to_query()).await?;
        providers.retain(|p| filter.accepts(p));
        Ok(providers)
    }

    async fn update_status(&self, id: &str, status: ProviderStatus) -> Result<(), StoreError> {
        self.collection.update_status(id, status).await
    }

    fn skipped_records(&self) -> u64 {
        self.collection.skipped_records()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SerialNumber;
    use crate::services::memory::InMemoryDocumentStore;
    use chrono::Utc;
    use serde_json::json;

    fn create_provider(serial: u64, regions: &[&str]) -> Provider {
        Provider {
            id: String::new(),
            serial_number: SerialNumber(serial),
            user_id: format!("user-{}", serial),
            name: format!("간병사 {}", serial),
            experience: "3년".to_string(),
            certificates: "요양보호사".to_string(),
            available_regions: regions.iter().map(|r| r.to_string()).collect(),
            phone_number: "010-2222-3333".to_string(),
            status: ProviderStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_legacy_region_string_is_listed() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        let store = DocumentProviderStore::new(docs.clone(), "caregivers");
        docs.put_raw(
            "caregivers",
            "legacy",
            json!({
                "serialNumber": 2001,
                "userId": "u1",
                "name": "박간병",
                "availableRegions": "부산,울산",
                "phoneNumber": "010-1234-0000",
                "createdAt": 1_700_000_000_000_i64,
            }),
        )
        .await;

        let providers = store.list(&ProviderFilter::default()).await.unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].id, "legacy");
        assert!(providers[0].serves("울산"));
    }

    #[tokio::test]
    async fn test_status_filter() {
        let store = DocumentProviderStore::new(Arc::new(InMemoryDocumentStore::new()), "caregivers");
        let approved = store.save(&create_provider(2001, &["서울"])).await.unwrap();
        store.save(&create_provider(2002, &["서울"])).await.unwrap();
        store.update_status(&approved, ProviderStatus::Approved).await.unwrap();

        let filter = ProviderFilter {
            status: Some(ProviderStatus::Approved),
            ..ProviderFilter::default()
        };
        let listed = store.list(&filter).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, approved);
    }

    #[tokio::test]
    async fn test_attribute_filters_keep_newest_first() {
        let store = DocumentProviderStore::new(Arc::new(InMemoryDocumentStore::new()), "caregivers");

        let mut oldest = create_provider(2001, &["서울", "경기"]);
        oldest.created_at = Utc::now() - chrono::Duration::minutes(30);
        let oldest = store.save(&oldest).await.unwrap();

        let mut busan = create_provider(2002, &["부산"]);
        busan.created_at = Utc::now() - chrono::Duration::minutes(20);
        store.save(&busan).await.unwrap();

        let mut newest = create_provider(2003, &["서울"]);
        newest.certificates = "요양보호사, 간호조무사".to_string();
        newest.experience = "5년".to_string();
        newest.created_at = Utc::now() - chrono::Duration::minutes(10);
        let newest = store.save(&newest).await.unwrap();

        let mut filter = ProviderFilter {
            region: Some("서울".to_string()),
            ..ProviderFilter::default()
        };
        let ids: Vec<String> = store.list(&filter).await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![newest.clone(), oldest.clone()]);

        filter.certificate = Some("간호".to_string());
        let ids: Vec<String> = store.list(&filter).await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![newest.clone()]);

        filter.experience = Some("3년".to_string());
        assert!(store.list(&filter).await.unwrap().is_empty());

        filter.clear_attributes();
        assert_eq!(store.list(&filter).await.unwrap().len(), 3);
    }

    #[test]
    fn test_region_filter_is_exact_and_blank_is_unset() {
        let provider = create_provider(2001, &["서울특별시"]);

        let exact = ProviderFilter {
            region: Some("서울".to_string()),
            ..ProviderFilter::default()
        };
        assert!(!exact.accepts(&provider));

        let blank = ProviderFilter {
            region: Some(" ".to_string()),
            certificate: Some(String::new()),
            ..ProviderFilter::default()
        };
        assert!(blank.accepts(&provider));
    }
}
