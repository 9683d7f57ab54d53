//! Typed entity stores over the document store
//!
//! Each store offers save/get/list/update_status. Listing is best-effort per
//! record: a document that no longer decodes is logged, counted and skipped
//! while the rest of the listing is still returned.

pub mod matches;
pub mod providers;
pub mod requests;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::StatusLifecycle;
use super::document::{Document, DocumentStore, Query, StoreError};

pub use matches::{DocumentMatchStore, MatchFilter, MatchStore, MockMatchStore};
pub use providers::{DocumentProviderStore, MockProviderStore, ProviderFilter, ProviderStore};
pub use requests::{DocumentRequestStore, MockRequestStore, RequestFilter, RequestStore};

/// Field every entity list is ordered by, newest first
pub const CREATED_AT_FIELD: &str = "createdAt";

/// A persisted entity with a lifecycle status
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    type Status: StatusLifecycle;

    fn set_id(&mut self, id: String);

    fn status(&self) -> Self::Status;

    /// Extra fields written together with a status change
    fn status_side_fields() -> Map<String, Value> {
        Map::new()
    }
}

/// Generic collection access shared by the typed stores
pub struct EntityCollection<E> {
    store: Arc<dyn DocumentStore>,
    name: String,
    skipped: AtomicU64,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> EntityCollection<E> {
    pub fn new(store: Arc<dyn DocumentStore>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
            skipped: AtomicU64::new(0),
            _entity: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of records skipped by listings since startup
    pub fn skipped_records(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    fn encode(entity: &E) -> Result<Value, StoreError> {
        let mut value = serde_json::to_value(entity)?;
        if let Some(body) = value.as_object_mut() {
            body.remove("id");
        }
        Ok(value)
    }

    fn decode(doc: Document) -> Result<E, StoreError> {
        let Document { id, data, .. } = doc;
        let mut entity: E = serde_json::from_value(data).map_err(|e| StoreError::Decode {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        entity.set_id(id);
        Ok(entity)
    }

    pub async fn save(&self, entity: &E) -> Result<String, StoreError> {
        let body = Self::encode(entity)?;
        let id = self.store.insert(&self.name, body).await?;
        tracing::debug!("Saved {} document {}", self.name, id);
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Result<E, StoreError> {
        let doc = self
            .store
            .get(&self.name, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", self.name, id)))?;
        Self::decode(doc)
    }

    /// List matching records newest first, skipping any that fail to decode
    pub async fn list(&self, query: Query) -> Result<Vec<E>, StoreError> {
        let query = query.order_by_desc(CREATED_AT_FIELD);
        let docs = self.store.query(&self.name, &query).await?;
        let total = docs.len();

        let entities: Vec<E> = docs
            .into_iter()
            .filter_map(|doc| match Self::decode(doc) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    self.skipped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Skipping unreadable {} record: {}", self.name, e);
                    None
                }
            })
            .collect();

        tracing::debug!(
            "Listed {} of {} {} records",
            entities.len(),
            total,
            self.name
        );
        Ok(entities)
    }

    /// Write a new status after checking the entity's transition table
    ///
    /// The write is a plain field update with no version check, so the last
    /// concurrent writer wins.
    pub async fn update_status(&self, id: &str, status: E::Status) -> Result<(), StoreError> {
        let current = self.get(id).await?.status();
        if !current.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                from: current.as_str(),
                to: status.as_str(),
            });
        }

        let mut fields = E::status_side_fields();
        fields.insert("status".to_string(), serde_json::to_value(status)?);
        self.store.update(&self.name, id, fields).await?;

        tracing::debug!(
            "Updated {} {} status {} -> {}",
            self.name,
            id,
            current.as_str(),
            status.as_str()
        );
        Ok(())
    }
}
