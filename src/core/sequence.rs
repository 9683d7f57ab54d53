use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{Namespace, SerialNumber};
use crate::services::{CasError, DocumentStore, StoreError};

/// Default number of read-compute-write attempts per allocation
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Errors that can occur while allocating a serial number
#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("Counter {namespace} still contended after {attempts} attempts")]
    Conflict { namespace: Namespace, attempts: u32 },

    #[error("Counter store error: {0}")]
    Store(#[from] StoreError),
}

/// Per-namespace counter allocation over the store's compare-and-swap
///
/// Each attempt snapshots the counter, computes the next value and writes
/// it back only if the snapshot is still current. A lost race restarts the
/// whole attempt. Uniqueness comes entirely from the store's conditional
/// write; callers are not serialized here.
#[derive(Clone)]
pub struct SequenceAllocator {
    store: Arc<dyn DocumentStore>,
    collection: String,
    max_attempts: u32,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            store,
            collection: collection.into(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Allocate the next serial for `namespace`
    pub async fn allocate(&self, namespace: Namespace) -> Result<SerialNumber, AllocationError> {
        let spec = namespace.spec();

        for attempt in 1..=self.max_attempts {
            let snapshot = self.store.get(&self.collection, spec.counter_id).await?;

            let (current, version) = match snapshot {
                Some(doc) => {
                    let value = doc.data.get("value").and_then(|v| v.as_u64()).ok_or_else(|| {
                        StoreError::Decode {
                            id: doc.id.clone(),
                            reason: "counter value is not an unsigned integer".to_string(),
                        }
                    })?;
                    (value, Some(doc.version))
                }
                None => (spec.base, None),
            };

            let next = current.checked_add(1).ok_or_else(|| StoreError::Decode {
                id: spec.counter_id.to_string(),
                reason: "counter is exhausted".to_string(),
            })?;
            let body = json!({ "namespace": spec.name, "value": next });

            match self
                .store
                .compare_and_swap(&self.collection, spec.counter_id, version, body)
                .await
            {
                Ok(_) => {
                    tracing::debug!("Allocated {} serial {} (attempt {})", namespace, next, attempt);
                    return Ok(SerialNumber(next));
                }
                Err(CasError::Conflict) => {
                    tracing::debug!(
                        "Counter {} contended on attempt {}/{}",
                        namespace,
                        attempt,
                        self.max_attempts
                    );
                    tokio::task::yield_now().await;
                }
                Err(CasError::Store(e)) => return Err(e.into()),
            }
        }

        tracing::warn!(
            "Giving up on {} counter after {} contended attempts",
            namespace,
            self.max_attempts
        );
        Err(AllocationError::Conflict {
            namespace,
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{Document, InMemoryDocumentStore, MockDocumentStore};
    use std::collections::HashSet;

    fn allocator(max_attempts: u32) -> SequenceAllocator {
        SequenceAllocator::new(Arc::new(InMemoryDocumentStore::new()), "counters", max_attempts)
    }

    #[tokio::test]
    async fn test_sequential_allocation_starts_above_base() {
        let allocator = allocator(DEFAULT_MAX_ATTEMPTS);

        let serials: Vec<u64> = {
            let mut out = Vec::new();
            for _ in 0..5 {
                out.push(allocator.allocate(Namespace::Match).await.unwrap().value());
            }
            out
        };

        assert_eq!(
            serials,
            vec![30_000_000_001, 30_000_000_002, 30_000_000_003, 30_000_000_004, 30_000_000_005]
        );
    }

    #[tokio::test]
    async fn test_namespaces_are_independent() {
        let allocator = allocator(DEFAULT_MAX_ATTEMPTS);

        assert_eq!(allocator.allocate(Namespace::Request).await.unwrap().value(), 1001);
        assert_eq!(allocator.allocate(Namespace::Provider).await.unwrap().value(), 2001);
        assert_eq!(allocator.allocate(Namespace::Request).await.unwrap().value(), 1002);
        assert_eq!(allocator.allocate(Namespace::Match).await.unwrap().value(), 30_000_000_001);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocations_are_distinct() {
        const CALLERS: u32 = 16;
        // A caller can lose at most once per competing commit
        let allocator = allocator(CALLERS);

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let allocator = allocator.clone();
                tokio::spawn(async move { allocator.allocate(Namespace::Request).await })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            let serial = handle.await.unwrap().unwrap();
            assert!(seen.insert(serial), "serial {} returned twice", serial);
        }

        let expected: HashSet<SerialNumber> = (1001..1001 + CALLERS as u64).map(SerialNumber).collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_conflict_retries_whole_attempt() {
        let mut store = MockDocumentStore::new();
        let mut reads = 0u64;
        store.expect_get().times(3).returning(move |_, id| {
            reads += 1;
            Ok(Some(Document {
                id: id.to_string(),
                data: json!({ "value": 1000 + reads }),
                version: reads,
            }))
        });

        let mut swaps = 0;
        store
            .expect_compare_and_swap()
            .times(3)
            .returning(move |_, _, _, _| {
                swaps += 1;
                if swaps < 3 {
                    Err(CasError::Conflict)
                } else {
                    Ok(4)
                }
            });

        let allocator = SequenceAllocator::new(Arc::new(store), "counters", DEFAULT_MAX_ATTEMPTS);
        // The third snapshot read 1003, so the winner writes 1004
        let serial = allocator.allocate(Namespace::Request).await.unwrap();
        assert_eq!(serial.value(), 1004);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_report_conflict() {
        let mut store = MockDocumentStore::new();
        store.expect_get().times(3).returning(|_, _| Ok(None));
        store
            .expect_compare_and_swap()
            .times(3)
            .returning(|_, _, _, _| Err(CasError::Conflict));

        let allocator = SequenceAllocator::new(Arc::new(store), "counters", 3);
        let result = allocator.allocate(Namespace::Match).await;

        assert!(matches!(
            result,
            Err(AllocationError::Conflict { namespace: Namespace::Match, attempts: 3 })
        ));
    }

    #[tokio::test]
    async fn test_store_outage_is_not_retried() {
        let mut store = MockDocumentStore::new();
        store
            .expect_get()
            .times(1)
            .returning(|_, _| Err(StoreError::Unavailable("connection refused".to_string())));
        store.expect_compare_and_swap().never();

        let allocator = SequenceAllocator::new(Arc::new(store), "counters", 5);
        let result = allocator.allocate(Namespace::Provider).await;

        assert!(matches!(result, Err(AllocationError::Store(_))));
    }

    #[tokio::test]
    async fn test_corrupt_counter_is_a_store_error() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        docs.put_raw("counters", "match_counter", json!({ "value": "oops" })).await;

        let allocator = SequenceAllocator::new(docs, "counters", 5);
        assert!(matches!(
            allocator.allocate(Namespace::Match).await,
            Err(AllocationError::Store(StoreError::Decode { .. }))
        ));
    }

    #[tokio::test]
    async fn test_exhausted_counter_is_a_store_error() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        docs.put_raw("counters", "match_counter", json!({ "value": u64::MAX })).await;

        let allocator = SequenceAllocator::new(docs.clone(), "counters", 5);
        assert!(matches!(
            allocator.allocate(Namespace::Match).await,
            Err(AllocationError::Store(StoreError::Decode { .. }))
        ));

        let counter = docs.get("counters", "match_counter").await.unwrap().unwrap();
        assert_eq!(counter.data["value"], json!(u64::MAX));
    }
}
