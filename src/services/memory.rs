use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::document::{CasError, Document, DocumentStore, Query, StoreError};

type Collection = HashMap<String, Document>;

/// In-process document store used by tests and `database.url = "memory"`
///
/// Each call takes the lock independently, so a read followed by a
/// `compare_and_swap` can interleave with other writers exactly like a
/// remote store would.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document under a fixed id, bypassing encoding
    pub async fn put_raw(&self, collection: &str, id: &str, data: Value) {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        let version = docs.get(id).map(|d| d.version + 1).unwrap_or(1);
        docs.insert(
            id.to_string(),
            Document {
                id: id.to_string(),
                data,
                version,
            },
        );
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

/// Descending order on a JSON field; numbers compare numerically, missing
/// fields sort last
fn compare_desc(a: &Value, b: &Value, field: &str) -> Ordering {
    match (a.get(field), b.get(field)) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::MIN);
            let y = y.as_f64().unwrap_or(f64::MIN);
            y.partial_cmp(&x).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => y.cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn insert(&self, collection: &str, data: Value) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut collections = self.collections.write().await;
        collections.entry(collection.to_string()).or_default().insert(
            id.clone(),
            Document {
                id: id.clone(),
                data,
                version: 1,
            },
        );
        tracing::debug!("Inserted {}/{}", collection, id);
        Ok(id)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;

        let body = doc.data.as_object_mut().ok_or_else(|| StoreError::Decode {
            id: id.to_string(),
            reason: "document body is not an object".to_string(),
        })?;
        body.extend(fields);
        doc.version += 1;
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let mut docs: Vec<Document> = collections
            .get(collection)
            .map(|c| c.values().filter(|d| query.matches(&d.data)).cloned().collect())
            .unwrap_or_default();

        if let Some(field) = &query.order_by_desc {
            docs.sort_by(|a, b| compare_desc(&a.data, &b.data, field));
        }
        Ok(docs)
    }

    async fn compare_and_swap(
        &self,
        collection: &str,
        id: &str,
        expected_version: Option<u64>,
        data: Value,
    ) -> Result<u64, CasError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        let current = docs.get(id).map(|d| d.version);

        if current != expected_version {
            return Err(CasError::Conflict);
        }

        let version = current.map(|v| v + 1).unwrap_or(1);
        docs.insert(
            id.to_string(),
            Document {
                id: id.to_string(),
                data,
                version,
            },
        );
        Ok(version)
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_get_update() {
        let store = InMemoryDocumentStore::new();
        let id = store.insert("items", json!({"status": "pending"})).await.unwrap();

        let mut fields = Map::new();
        fields.insert("status".to_string(), json!("matched"));
        store.update("items", &id, fields).await.unwrap();

        let doc = store.get("items", &id).await.unwrap().unwrap();
        assert_eq!(doc.data["status"], "matched");
        assert_eq!(doc.version, 2);
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let store = InMemoryDocumentStore::new();
        let result = store.update("items", "nope", Map::new()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_query_orders_newest_first() {
        let store = InMemoryDocumentStore::new();
        store.put_raw("items", "a", json!({"createdAt": 1, "kind": "x"})).await;
        store.put_raw("items", "b", json!({"createdAt": 3, "kind": "x"})).await;
        store.put_raw("items", "c", json!({"createdAt": 2, "kind": "y"})).await;

        let all = store
            .query("items", &Query::new().order_by_desc("createdAt"))
            .await
            .unwrap();
        let ids: Vec<_> = all.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);

        let filtered = store
            .query("items", &Query::new().where_eq("kind", "x").order_by_desc("createdAt"))
            .await
            .unwrap();
        let ids: Vec<_> = filtered.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_compare_and_swap_conflicts() {
        let store = InMemoryDocumentStore::new();

        let v1 = store.compare_and_swap("c", "k", None, json!({"value": 1})).await.unwrap();
        assert_eq!(v1, 1);

        // Document already exists
        assert!(matches!(
            store.compare_and_swap("c", "k", None, json!({"value": 1})).await,
            Err(CasError::Conflict)
        ));

        let v2 = store.compare_and_swap("c", "k", Some(1), json!({"value": 2})).await.unwrap();
        assert_eq!(v2, 2);

        // Stale snapshot
        assert!(matches!(
            store.compare_and_swap("c", "k", Some(1), json!({"value": 3})).await,
            Err(CasError::Conflict)
        ));
    }
}
