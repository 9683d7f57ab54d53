use actix_web::{web, HttpRequest, HttpResponse};

use super::{ApiError, AppState};
use crate::core::find_orphaned_matches;
use crate::models::{ListResponse, MatchStatus, OrphanedMatchesResponse, StatusLifecycle, UpdateStatusBody};
use crate::services::MatchFilter;

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/matches", web::get().to(list_matches))
        .route("/matches/orphaned", web::get().to(orphaned_matches))
        .route("/matches/{id}", web::get().to(get_match))
        .route("/matches/{id}/status", web::put().to(update_status));
}

/// GET /api/v1/matches?status=pending&requestSerialNumber=1001
async fn list_matches(
    state: web::Data<AppState>,
    req: HttpRequest,
    filter: web::Query<MatchFilter>,
) -> Result<HttpResponse, ApiError> {
    state.admin(&req)?;
    let matches = state.matches.list(&filter).await?;
    Ok(HttpResponse::Ok().json(ListResponse::from(matches)))
}

/// Matches saved by a commit whose request is still pending
///
/// GET /api/v1/matches/orphaned
async fn orphaned_matches(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    state.admin(&req)?;
    let orphaned = find_orphaned_matches(state.matches.as_ref(), state.requests.as_ref()).await?;

    Ok(HttpResponse::Ok().json(OrphanedMatchesResponse {
        count: orphaned.len(),
        orphaned,
    }))
}

async fn get_match(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    state.admin(&req)?;
    Ok(HttpResponse::Ok().json(state.matches.get(&path).await?))
}

async fn update_status(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UpdateStatusBody<MatchStatus>>,
) -> Result<HttpResponse, ApiError> {
    let admin = state.admin(&req)?;
    state.matches.update_status(&path, body.status).await?;

    tracing::info!(
        "Match {} set to {} by {}",
        path.as_str(),
        body.status.as_str(),
        admin.user_id
    );
    Ok(HttpResponse::Ok().json(state.matches.get(&path).await?))
}
