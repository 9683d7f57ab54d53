use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{MatchStatus, SerialNumber};
use crate::services::{MatchFilter, MatchStore, RequestFilter, RequestStore, StoreError};

/// A match whose request was left pending by an interrupted commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedMatch {
    pub match_id: String,
    pub match_serial: SerialNumber,
    pub request_id: String,
    pub request_serial: SerialNumber,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// List live matches whose linked request is still `pending`
///
/// Cancelled and completed matches are ignored. Results follow the match
/// listing order, newest first.
pub async fn find_orphaned_matches(
    matches: &dyn MatchStore,
    requests: &dyn RequestStore,
) -> Result<Vec<OrphanedMatch>, StoreError> {
    let pending: HashMap<SerialNumber, String> = requests
        .list(&RequestFilter::pending())
        .await?
        .into_iter()
        .map(|r| (r.serial_number, r.id))
        .collect();

    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let orphaned: Vec<OrphanedMatch> = matches
        .list(&MatchFilter::default())
        .await?
        .into_iter()
        .filter(|m| matches!(m.status, MatchStatus::Pending | MatchStatus::Confirmed))
        .filter_map(|m| {
            pending.get(&m.request_serial_number).map(|request_id| OrphanedMatch {
                match_id: m.id,
                match_serial: m.serial_number,
                request_id: request_id.clone(),
                request_serial: m.request_serial_number,
                created_at: m.created_at,
            })
        })
        .collect();

    if !orphaned.is_empty() {
        tracing::warn!("Found {} matches linked to pending requests", orphaned.len());
    }
    Ok(orphaned)
}
