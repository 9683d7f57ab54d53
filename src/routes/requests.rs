use actix_web::{web, HttpRequest, HttpResponse};

use super::{ApiError, AppState};
use crate::core::format_labeled;
use crate::models::{
    CreatedResponse, ListResponse, Namespace, RequestDraft, RequestStatus, StatusLifecycle,
    UpdateStatusBody,
};
use crate::services::{IdentityError, RequestFilter, Role, StaticIdentity};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/requests", web::post().to(submit_request))
        .route("/requests", web::get().to(list_requests))
        .route("/requests/mine", web::get().to(my_requests))
        .route("/requests/{id}", web::get().to(get_request))
        .route("/requests/{id}/status", web::put().to(update_status));
}

/// Submit a care request
///
/// POST /api/v1/requests
async fn submit_request(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<RequestDraft>,
) -> Result<HttpResponse, ApiError> {
    let identity = StaticIdentity::new(state.identity(&req)?);
    let request = state
        .submissions
        .submit_request(&identity, body.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(CreatedResponse {
        display: format_labeled(Namespace::Request, request.serial_number.value()),
        item: request,
    }))
}

/// The caller's own requests, newest first
async fn my_requests(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let identity = StaticIdentity::new(state.identity(&req)?);
    let requests = state.submissions.my_requests(&identity).await?;
    Ok(HttpResponse::Ok().json(ListResponse::from(requests)))
}

/// List requests (admin)
///
/// GET /api/v1/requests?status=pending&userId=...
async fn list_requests(
    state: web::Data<AppState>,
    req: HttpRequest,
    filter: web::Query<RequestFilter>,
) -> Result<HttpResponse, ApiError> {
    state.admin(&req)?;
    let requests = state.requests.list(&filter).await?;
    Ok(HttpResponse::Ok().json(ListResponse::from(requests)))
}

/// Get one request; visible to admins and its owner
async fn get_request(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let identity = state.identity(&req)?;
    let request = state.requests.get(&path).await?;

    if identity.role != Role::Admin && identity.user_id != request.user_id {
        return Err(IdentityError::Forbidden.into());
    }
    Ok(HttpResponse::Ok().json(request))
}

/// Move a request along its lifecycle (admin)
async fn update_status(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UpdateStatusBody<RequestStatus>>,
) -> Result<HttpResponse, ApiError> {
    let admin = state.admin(&req)?;
    state.requests.update_status(&path, body.status).await?;

    tracing::info!(
        "Request {} set to {} by {}",
        path.as_str(),
        body.status.as_str(),
        admin.user_id
    );
    Ok(HttpResponse::Ok().json(state.requests.get(&path).await?))
}
