use actix_web::{web, HttpRequest, HttpResponse};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use validator::Validate;

use super::{ApiError, AppState};
use crate::core::{MatchWorkflow, WorkflowDeps};
use crate::models::{NotesBody, SelectProviderBody, SelectRequestBody};

type Session = Arc<Mutex<MatchWorkflow>>;

/// One matching workflow per administrator
#[derive(Clone, Default)]
pub struct WorkflowSessions {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
}

impl WorkflowSessions {
    /// The admin's workflow, started with fresh lists on first use
    pub async fn get_or_start(&self, admin_id: &str, deps: WorkflowDeps) -> Session {
        if let Some(session) = self.sessions.lock().await.get(admin_id) {
            return session.clone();
        }

        // Loading happens outside the registry lock
        let started = Arc::new(Mutex::new(MatchWorkflow::start(deps).await));
        tracing::info!("Started matching workflow for admin {}", admin_id);

        self.sessions
            .lock()
            .await
            .entry(admin_id.to_string())
            .or_insert(started)
            .clone()
    }

    /// Drop the admin's workflow; the next request starts a new one
    pub async fn end(&self, admin_id: &str) -> bool {
        let ended = self.sessions.lock().await.remove(admin_id).is_some();
        if ended {
            tracing::info!("Ended matching workflow for admin {}", admin_id);
        }
        ended
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin/workflow")
            .route("", web::get().to(view))
            .route("/select-request", web::post().to(select_request))
            .route("/select-provider", web::post().to(select_provider))
            .route("/notes", web::post().to(set_notes))
            .route("/advance", web::post().to(advance))
            .route("/retreat", web::post().to(retreat))
            .route("/commit", web::post().to(commit))
            .route("/reset", web::post().to(reset))
            .route("/clear-error", web::post().to(clear_error)),
    );
}

async fn session(state: &AppState, req: &HttpRequest) -> Result<Session, ApiError> {
    let admin = state.admin(req)?;
    Ok(state
        .sessions
        .get_or_start(&admin.user_id, state.workflow_deps())
        .await)
}

fn respond(workflow: &MatchWorkflow) -> HttpResponse {
    HttpResponse::Ok().json(workflow.view())
}

/// GET /api/v1/admin/workflow
async fn view(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let session = session(&state, &req).await?;
    let workflow = session.lock().await;
    Ok(respond(&workflow))
}

async fn select_request(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<SelectRequestBody>,
) -> Result<HttpResponse, ApiError> {
    body.validate()?;
    let session = session(&state, &req).await?;
    let mut workflow = session.lock().await;
    workflow.select_request_by_id(&body.request_id);
    Ok(respond(&workflow))
}

async fn select_provider(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<SelectProviderBody>,
) -> Result<HttpResponse, ApiError> {
    body.validate()?;
    let session = session(&state, &req).await?;
    let mut workflow = session.lock().await;
    workflow.select_provider_by_id(&body.provider_id);
    Ok(respond(&workflow))
}

async fn set_notes(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<NotesBody>,
) -> Result<HttpResponse, ApiError> {
    let session = session(&state, &req).await?;
    let mut workflow = session.lock().await;
    workflow.set_notes(body.into_inner().notes);
    Ok(respond(&workflow))
}

async fn advance(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let session = session(&state, &req).await?;
    let mut workflow = session.lock().await;
    workflow.advance();
    Ok(respond(&workflow))
}

async fn retreat(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let session = session(&state, &req).await?;
    let mut workflow = session.lock().await;
    workflow.retreat();
    Ok(respond(&workflow))
}

/// POST /api/v1/admin/workflow/commit
///
/// Commit failures are reported in the returned view, not as HTTP errors.
async fn commit(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let session = session(&state, &req).await?;
    let mut workflow = session.lock().await;
    workflow.commit().await;
    Ok(respond(&workflow))
}

/// POST /api/v1/admin/workflow/reset
///
/// Ends the session and returns the view of a freshly loaded workflow. The
/// registry only keeps admins that are part way through a match.
async fn reset(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let admin = state.admin(&req)?;
    state.sessions.end(&admin.user_id).await;
    let workflow = MatchWorkflow::start(state.workflow_deps()).await;
    Ok(respond(&workflow))
}

async fn clear_error(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let session = session(&state, &req).await?;
    let mut workflow = session.lock().await;
    workflow.clear_error();
    Ok(respond(&workflow))
}
