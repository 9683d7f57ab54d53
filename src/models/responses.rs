use serde::{Deserialize, Serialize};

use crate::core::reconcile::OrphanedMatch;

/// Listing response shared by the entity endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

/// Created entity with its display serial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedResponse<T> {
    pub item: T,
    pub display: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub skipped_records: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Matches whose request was never marked matched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanedMatchesResponse {
    pub orphaned: Vec<OrphanedMatch>,
    pub count: usize,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
