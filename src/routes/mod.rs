// Route exports
pub mod health;
pub mod matches;
pub mod providers;
pub mod requests;
pub mod workflow;

use actix_web::http::{header, StatusCode};
use actix_web::{error, web, HttpRequest, HttpResponse, ResponseError};
use std::sync::Arc;
use thiserror::Error;
use validator::ValidationErrors;

use crate::config::CollectionSettings;
use crate::core::{AllocationError, SequenceAllocator, SubmissionError, SubmissionService, WorkflowDeps};
use crate::models::ErrorResponse;
use crate::services::{
    DocumentMatchStore, DocumentProviderStore, DocumentRequestStore, DocumentStore, Identity,
    IdentityError, JwtVerifier, MatchStore, ProviderStore, RequestStore, StoreError,
};
use workflow::WorkflowSessions;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<dyn DocumentStore>,
    pub requests: Arc<dyn RequestStore>,
    pub providers: Arc<dyn ProviderStore>,
    pub matches: Arc<dyn MatchStore>,
    pub allocator: SequenceAllocator,
    pub submissions: SubmissionService,
    pub verifier: JwtVerifier,
    pub sessions: WorkflowSessions,
}

impl AppState {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        collections: &CollectionSettings,
        max_attempts: u32,
        verifier: JwtVerifier,
    ) -> Self {
        let requests: Arc<dyn RequestStore> = Arc::new(DocumentRequestStore::new(
            documents.clone(),
            collections.requests.as_str(),
        ));
        let providers: Arc<dyn ProviderStore> = Arc::new(DocumentProviderStore::new(
            documents.clone(),
            collections.providers.as_str(),
        ));
        let matches: Arc<dyn MatchStore> = Arc::new(DocumentMatchStore::new(
            documents.clone(),
            collections.matches.as_str(),
        ));
        let allocator = SequenceAllocator::new(
            documents.clone(),
            collections.counters.as_str(),
            max_attempts,
        );
        let submissions =
            SubmissionService::new(allocator.clone(), requests.clone(), providers.clone());

        Self {
            documents,
            requests,
            providers,
            matches,
            allocator,
            submissions,
            verifier,
            sessions: WorkflowSessions::default(),
        }
    }

    pub fn workflow_deps(&self) -> WorkflowDeps {
        WorkflowDeps {
            allocator: self.allocator.clone(),
            requests: self.requests.clone(),
            providers: self.providers.clone(),
            matches: self.matches.clone(),
        }
    }

    /// Records skipped by listings across all entity stores
    pub fn skipped_records(&self) -> u64 {
        self.requests.skipped_records()
            + self.providers.skipped_records()
            + self.matches.skipped_records()
    }

    /// Resolve the bearer token on `req`
    pub fn identity(&self, req: &HttpRequest) -> Result<Identity, ApiError> {
        let header = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        Ok(self.verifier.verify_header(header)?)
    }

    pub fn admin(&self, req: &HttpRequest) -> Result<Identity, ApiError> {
        let identity = self.identity(req)?;
        identity.require_admin()?;
        Ok(identity)
    }
}

/// Errors surfaced by HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Identity(#[from] IdentityError),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::Identity(e) => ApiError::Identity(e),
            SubmissionError::Invalid(e) => e.into(),
            SubmissionError::Allocation(e) => ApiError::Allocation(e),
            SubmissionError::Store(e) => ApiError::Store(e),
        }
    }
}

impl ApiError {
    fn label(&self) -> &'static str {
        match self {
            ApiError::Identity(IdentityError::Forbidden) => "forbidden",
            ApiError::Identity(_) => "unauthorized",
            ApiError::Validation(_) => "validation_failed",
            ApiError::Store(StoreError::NotFound(_)) => "not_found",
            ApiError::Store(StoreError::InvalidTransition { .. }) => "invalid_transition",
            ApiError::Store(_) => "store_error",
            ApiError::Allocation(AllocationError::Conflict { .. }) => "allocation_conflict",
            ApiError::Allocation(_) => "store_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Identity(IdentityError::Forbidden) => StatusCode::FORBIDDEN,
            ApiError::Identity(_) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Allocation(AllocationError::Conflict { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Allocation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        HttpResponse::build(status).json(ErrorResponse {
            error: self.label().to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        })
    }
}

/// JSON error response for malformed payloads
#[derive(Debug, Error)]
#[error("{error}: {message}")]
pub struct PayloadError {
    error: &'static str,
    message: String,
}

impl ResponseError for PayloadError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::BadRequest().json(ErrorResponse {
            error: self.error.to_string(),
            message: self.message.clone(),
            status_code: 400,
        })
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    PayloadError {
        error: "invalid_json",
        message: format!("Invalid JSON: {}", err),
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    PayloadError {
        error: "invalid_query",
        message: format!("Invalid query: {}", err),
    }
    .into()
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(health::configure)
            .configure(requests::configure)
            .configure(providers::configure)
            .configure(matches::configure)
            .configure(workflow::configure),
    );
}
