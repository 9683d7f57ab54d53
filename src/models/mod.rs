// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Match, MatchStatus, Namespace, NamespaceSpec, Provider, ProviderStatus, Request,
    RequestStatus, SerialNumber, StatusLifecycle,
};
pub use requests::{
    NotesBody, ProviderDraft, RequestDraft, SelectProviderBody, SelectRequestBody,
    UpdateStatusBody,
};
pub use responses::{
    CreatedResponse, ErrorResponse, HealthResponse, ListResponse, OrphanedMatchesResponse,
};
