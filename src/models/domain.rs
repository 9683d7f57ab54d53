use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::core::serial::format_serial;

/// Human-readable serial number shared by requests, providers and matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerialNumber(pub u64);

impl SerialNumber {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for SerialNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_serial(self.0))
    }
}

/// One of the three independent serial sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Request,
    Provider,
    Match,
}

/// Static description of a namespace's counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceSpec {
    pub name: &'static str,
    pub counter_id: &'static str,
    pub label: &'static str,
    pub base: u64,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Request, Namespace::Provider, Namespace::Match];

    /// Counter table: document id, display label and base offset per namespace
    pub const fn spec(self) -> NamespaceSpec {
        match self {
            Namespace::Request => NamespaceSpec {
                name: "request",
                counter_id: "request_counter",
                label: "간병 신청",
                base: 1_000,
            },
            Namespace::Provider => NamespaceSpec {
                name: "provider",
                counter_id: "provider_counter",
                label: "간병사",
                base: 2_000,
            },
            Namespace::Match => NamespaceSpec {
                name: "match",
                counter_id: "match_counter",
                label: "매칭",
                base: 30_000_000_000,
            },
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().name)
    }
}

/// Closed status set with an explicit transition table
pub trait StatusLifecycle:
    Copy + Eq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Statuses reachable from `self` in one step, excluding `self`
    fn allowed_next(self) -> &'static [Self];

    fn as_str(self) -> &'static str;

    /// Re-applying the current status is always accepted
    fn can_transition_to(self, next: Self) -> bool {
        self == next || self.allowed_next().contains(&next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Matched,
    Completed,
    Cancelled,
}

impl StatusLifecycle for RequestStatus {
    fn allowed_next(self) -> &'static [Self] {
        match self {
            RequestStatus::Pending => &[RequestStatus::Matched, RequestStatus::Cancelled],
            RequestStatus::Matched => &[
                RequestStatus::Completed,
                RequestStatus::Cancelled,
                RequestStatus::Pending,
            ],
            RequestStatus::Completed | RequestStatus::Cancelled => &[],
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Matched => "matched",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl StatusLifecycle for ProviderStatus {
    fn allowed_next(self) -> &'static [Self] {
        match self {
            ProviderStatus::Pending => &[ProviderStatus::Approved, ProviderStatus::Rejected],
            ProviderStatus::Approved => &[ProviderStatus::Rejected],
            ProviderStatus::Rejected => &[ProviderStatus::Approved],
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ProviderStatus::Pending => "pending",
            ProviderStatus::Approved => "approved",
            ProviderStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl StatusLifecycle for MatchStatus {
    fn allowed_next(self) -> &'static [Self] {
        match self {
            MatchStatus::Pending => &[MatchStatus::Confirmed, MatchStatus::Cancelled],
            MatchStatus::Confirmed => &[MatchStatus::Completed, MatchStatus::Cancelled],
            MatchStatus::Completed | MatchStatus::Cancelled => &[],
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Confirmed => "confirmed",
            MatchStatus::Completed => "completed",
            MatchStatus::Cancelled => "cancelled",
        }
    }
}

/// Care request submitted by a guardian
///
/// `id` is the store-assigned document key. It is never written into the
/// document body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub serial_number: SerialNumber,
    pub user_id: String,
    pub patient_name: String,
    pub guardian_name: String,
    #[serde(default)]
    pub patient_condition: String,
    pub care_start_date: NaiveDate,
    pub care_end_date: NaiveDate,
    pub location: String,
    #[serde(default)]
    pub patient_phone_number: Option<String>,
    pub guardian_phone_number: String,
    #[serde(default)]
    pub status: RequestStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Caregiver available for matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub serial_number: SerialNumber,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub experience: String,
    #[serde(default)]
    pub certificates: String,
    #[serde(deserialize_with = "deserialize_regions")]
    pub available_regions: BTreeSet<String>,
    pub phone_number: String,
    #[serde(default)]
    pub status: ProviderStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Provider {
    pub fn serves(&self, location: &str) -> bool {
        self.available_regions.contains(location)
    }
}

/// Older provider documents store regions as one comma-separated string
fn deserialize_regions<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Regions {
        List(Vec<String>),
        Legacy(String),
    }

    let regions = match Regions::deserialize(deserializer)? {
        Regions::List(list) => list,
        Regions::Legacy(joined) => joined.split(',').map(str::to_string).collect(),
    };

    Ok(regions
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect())
}

/// Link between a request and a provider, referenced by serial number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub serial_number: SerialNumber,
    pub request_serial_number: SerialNumber,
    pub provider_serial_number: SerialNumber,
    #[serde(default)]
    pub status: MatchStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Match {
    pub fn new(
        serial_number: SerialNumber,
        request: &Request,
        provider: &Provider,
        notes: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            serial_number,
            request_serial_number: request.serial_number,
            provider_serial_number: provider.serial_number,
            status: MatchStatus::Pending,
            notes: notes.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
