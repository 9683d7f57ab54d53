use actix_web::{web, HttpRequest, HttpResponse};

use super::{ApiError, AppState};
use crate::core::format_labeled;
use crate::models::{
    CreatedResponse, ListResponse, Namespace, ProviderDraft, ProviderStatus, StatusLifecycle,
    UpdateStatusBody,
};
use crate::services::{ProviderFilter, StaticIdentity};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/providers", web::post().to(register_provider))
        .route("/providers", web::get().to(list_providers))
        .route("/providers/{id}", web::get().to(get_provider))
        .route("/providers/{id}/status", web::put().to(update_status));
}

/// Register as a caregiver
///
/// POST /api/v1/providers
async fn register_provider(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ProviderDraft>,
) -> Result<HttpResponse, ApiError> {
    let identity = StaticIdentity::new(state.identity(&req)?);
    let provider = state
        .submissions
        .register_provider(&identity, body.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(CreatedResponse {
        display: format_labeled(Namespace::Provider, provider.serial_number.value()),
        item: provider,
    }))
}

/// GET /api/v1/providers?status=approved
async fn list_providers(
    state: web::Data<AppState>,
    req: HttpRequest,
    filter: web::Query<ProviderFilter>,
) -> Result<HttpResponse, ApiError> {
    state.admin(&req)?;
    let providers = state.providers.list(&filter).await?;
    Ok(HttpResponse::Ok().json(ListResponse::from(providers)))
}

async fn get_provider(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    state.admin(&req)?;
    Ok(HttpResponse::Ok().json(state.providers.get(&path).await?))
}

/// Approve or reject a caregiver (admin)
async fn update_status(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UpdateStatusBody<ProviderStatus>>,
) -> Result<HttpResponse, ApiError> {
    let admin = state.admin(&req)?;
    state.providers.update_status(&path, body.status).await?;

    tracing::info!(
        "Provider {} set to {} by {}",
        path.as_str(),
        body.status.as_str(),
        admin.user_id
    );
    Ok(HttpResponse::Ok().json(state.providers.get(&path).await?))
}
