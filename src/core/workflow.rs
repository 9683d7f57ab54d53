//! Admin matching workflow
//!
//! The workflow is an immutable [`WorkflowState`] value advanced by the pure
//! [`reduce`] function. [`MatchWorkflow`] owns one state per admin session,
//! performs the store and allocator calls, and feeds their outcomes back in
//! as [`WorkflowAction`]s.
//!
//! # Steps
//! 1. Select a pending request
//! 2. Select a provider (those serving the request's location listed first)
//! 3. Confirm and commit
//!
//! # Commit
//! Committing is a saga without a cross-document transaction:
//! allocate a match serial, save the match, then mark the request matched.
//! Saving the match is the durable point. If the final status update fails
//! the workflow reports a [`PartialCommit`] instead of rolling back.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::core::region::rank;
use crate::core::sequence::{AllocationError, SequenceAllocator};
use crate::core::serial::format_labeled;
use crate::models::{Match, Namespace, Provider, Request, RequestStatus, SerialNumber};
use crate::services::{MatchStore, ProviderFilter, ProviderStore, RequestFilter, RequestStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    SelectingRequest,
    SelectingProvider,
    Confirming,
    Created,
}

impl Step {
    /// Screen step number; a created match stays on the confirmation step
    pub fn number(self) -> u8 {
        match self {
            Step::SelectingRequest => 1,
            Step::SelectingProvider => 2,
            Step::Confirming | Step::Created => 3,
        }
    }
}

/// Error shown inline at the current step
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Store(String),
}

impl WorkflowError {
    fn validation(message: &str) -> Self {
        WorkflowError::Validation(message.to_string())
    }
}

impl From<AllocationError> for WorkflowError {
    fn from(err: AllocationError) -> Self {
        WorkflowError::Store(format!("failed to allocate match serial: {}", err))
    }
}

/// A match was saved but its request was not marked matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialCommit {
    pub match_serial: SerialNumber,
    pub match_id: String,
    pub request_id: String,
    pub request_serial: SerialNumber,
    pub reason: String,
}

impl PartialCommit {
    pub fn message(&self) -> String {
        format!(
            "{} was created but {} is still pending: {}",
            format_labeled(Namespace::Match, self.match_serial.value()),
            format_labeled(Namespace::Request, self.request_serial.value()),
            self.reason
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowState {
    pub step: Step,
    /// Pending requests
    pub requests: Vec<Request>,
    /// Providers as loaded
    pub all_providers: Vec<Provider>,
    /// Providers ranked for the selected request's location
    pub providers: Vec<Provider>,
    pub selected_request: Option<Request>,
    pub selected_provider: Option<Provider>,
    pub notes: String,
    pub loading: bool,
    pub error: Option<WorkflowError>,
    pub partial_commit: Option<PartialCommit>,
    pub created_match_serial: Option<SerialNumber>,
}

impl WorkflowState {
    pub fn created(&self) -> bool {
        self.step == Step::Created
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowAction {
    Loaded {
        requests: Vec<Request>,
        providers: Vec<Provider>,
    },
    LoadFailed(String),
    SelectRequest { id: String },
    SelectProvider { id: String },
    SetNotes(String),
    Advance,
    Retreat,
    CommitStarted,
    /// A commit that could not start; leaves an in-flight one alone
    CommitRejected(WorkflowError),
    CommitFailed(WorkflowError),
    PartiallyCommitted(PartialCommit),
    Committed { serial: SerialNumber },
    Reset,
    ClearError,
}

/// Apply one action to the state
pub fn reduce(mut state: WorkflowState, action: WorkflowAction) -> WorkflowState {
    use WorkflowAction::*;

    // Created is terminal apart from housekeeping
    if state.created() && !matches!(action, Loaded { .. } | LoadFailed(_) | Reset | ClearError) {
        return state;
    }

    match action {
        Loaded {
            requests,
            providers,
        } => {
            state.providers = match &state.selected_request {
                Some(request) => rank(&providers, &request.location),
                None => providers.clone(),
            };
            state.requests = requests;
            state.all_providers = providers;
            state.loading = false;
        }
        LoadFailed(message) => {
            state.loading = false;
            state.error = Some(WorkflowError::Store(message));
        }
        SelectRequest { id } => match state.requests.iter().find(|r| r.id == id).cloned() {
            Some(request) => {
                state.providers = rank(&state.all_providers, &request.location);
                state.selected_request = Some(request);
            }
            None => state.error = Some(WorkflowError::validation("request is not available")),
        },
        SelectProvider { id } => match state.all_providers.iter().find(|p| p.id == id).cloned() {
            Some(provider) => state.selected_provider = Some(provider),
            None => state.error = Some(WorkflowError::validation("provider is not available")),
        },
        SetNotes(notes) => state.notes = notes,
        Advance => match state.step {
            Step::SelectingRequest if state.selected_request.is_none() => {
                state.error = Some(WorkflowError::validation("select a request"));
            }
            Step::SelectingRequest => {
                state.step = Step::SelectingProvider;
                state.error = None;
            }
            Step::SelectingProvider if state.selected_provider.is_none() => {
                state.error = Some(WorkflowError::validation("select a provider"));
            }
            Step::SelectingProvider => {
                state.step = Step::Confirming;
                state.error = None;
            }
            Step::Confirming | Step::Created => {}
        },
        Retreat => match state.step {
            Step::SelectingProvider => {
                state.step = Step::SelectingRequest;
                state.error = None;
            }
            Step::Confirming => {
                state.step = Step::SelectingProvider;
                state.error = None;
            }
            Step::SelectingRequest | Step::Created => {}
        },
        CommitStarted => {
            state.loading = true;
            state.error = None;
        }
        CommitRejected(error) => state.error = Some(error),
        CommitFailed(error) => {
            state.loading = false;
            state.error = Some(error);
        }
        PartiallyCommitted(partial) => {
            state.loading = false;
            state.partial_commit = Some(partial);
        }
        Committed { serial } => {
            state.loading = false;
            state.step = Step::Created;
            state.created_match_serial = Some(serial);
            state.error = None;
            state.partial_commit = None;
        }
        Reset => {
            state = WorkflowState {
                providers: state.all_providers.clone(),
                requests: state.requests,
                all_providers: state.all_providers,
                loading: true,
                ..WorkflowState::default()
            };
        }
        ClearError => {
            state.error = None;
            state.partial_commit = None;
        }
    }

    state
}

/// Selections a commit needs, or why it cannot start
pub fn plan_commit(state: &WorkflowState) -> Result<(Request, Provider, String), WorkflowError> {
    if state.loading {
        return Err(WorkflowError::validation("an operation is already in progress"));
    }
    match (state.step, &state.selected_request, &state.selected_provider) {
        (Step::Confirming, Some(request), Some(provider)) => {
            Ok((request.clone(), provider.clone(), state.notes.clone()))
        }
        _ => Err(WorkflowError::validation("selection incomplete")),
    }
}

/// Workflow state as handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowView {
    pub step: Step,
    pub step_number: u8,
    pub requests: Vec<Request>,
    pub providers: Vec<Provider>,
    pub selected_request: Option<Request>,
    pub selected_provider: Option<Provider>,
    pub notes: String,
    pub loading: bool,
    pub error: Option<WorkflowError>,
    pub partial_commit: Option<PartialCommit>,
    pub partial_commit_message: Option<String>,
    pub created: bool,
    pub created_match_serial: Option<SerialNumber>,
    pub created_match_display: Option<String>,
}

impl From<&WorkflowState> for WorkflowView {
    fn from(state: &WorkflowState) -> Self {
        Self {
            step: state.step,
            step_number: state.step.number(),
            requests: state.requests.clone(),
            providers: state.providers.clone(),
            selected_request: state.selected_request.clone(),
            selected_provider: state.selected_provider.clone(),
            notes: state.notes.clone(),
            loading: state.loading,
            error: state.error.clone(),
            partial_commit: state.partial_commit.clone(),
            partial_commit_message: state.partial_commit.as_ref().map(PartialCommit::message),
            created: state.created(),
            created_match_serial: state.created_match_serial,
            created_match_display: state
                .created_match_serial
                .map(|s| format_labeled(Namespace::Match, s.value())),
        }
    }
}

/// Collaborators the workflow drives
#[derive(Clone)]
pub struct WorkflowDeps {
    pub allocator: SequenceAllocator,
    pub requests: Arc<dyn RequestStore>,
    pub providers: Arc<dyn ProviderStore>,
    pub matches: Arc<dyn MatchStore>,
}

/// One admin session's matching workflow
pub struct MatchWorkflow {
    state: WorkflowState,
    deps: WorkflowDeps,
}

impl MatchWorkflow {
    /// Create a workflow with its request and provider lists loaded
    pub async fn start(deps: WorkflowDeps) -> Self {
        let mut workflow = Self {
            state: WorkflowState {
                loading: true,
                ..WorkflowState::default()
            },
            deps,
        };
        workflow.reload().await;
        workflow
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn view(&self) -> WorkflowView {
        WorkflowView::from(&self.state)
    }

    fn dispatch(&mut self, action: WorkflowAction) {
        apply(&mut self.state, action);
    }

    async fn reload(&mut self) {
        let requests = self.deps.requests.list(&RequestFilter::pending()).await;
        let providers = self.deps.providers.list(&ProviderFilter::default()).await;

        let action = match (requests, providers) {
            (Ok(requests), Ok(providers)) => {
                tracing::debug!(
                    "Loaded {} pending requests and {} providers",
                    requests.len(),
                    providers.len()
                );
                WorkflowAction::Loaded {
                    requests,
                    providers,
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!("Failed to load workflow lists: {}", e);
                WorkflowAction::LoadFailed(format!("failed to load lists: {}", e))
            }
        };
        self.dispatch(action);
    }

    pub fn select_request(&mut self, request: &Request) {
        self.select_request_by_id(&request.id);
    }

    pub fn select_request_by_id(&mut self, id: &str) {
        self.dispatch(WorkflowAction::SelectRequest { id: id.to_string() });
    }

    pub fn select_provider(&mut self, provider: &Provider) {
        self.select_provider_by_id(&provider.id);
    }

    pub fn select_provider_by_id(&mut self, id: &str) {
        self.dispatch(WorkflowAction::SelectProvider { id: id.to_string() });
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.dispatch(WorkflowAction::SetNotes(notes.into()));
    }

    pub fn advance(&mut self) {
        self.dispatch(WorkflowAction::Advance);
    }

    pub fn retreat(&mut self) {
        self.dispatch(WorkflowAction::Retreat);
    }

    pub fn clear_error(&mut self) {
        self.dispatch(WorkflowAction::ClearError);
    }

    pub async fn reset(&mut self) {
        self.dispatch(WorkflowAction::Reset);
        self.reload().await;
    }

    /// Create the match and mark its request matched
    ///
    /// Retrying after a failed allocation or save mints a fresh serial. If
    /// this future is dropped mid-saga the state still settles: before the
    /// match is saved it records a store error, afterwards a partial commit
    /// that the orphaned-match reconciliation query also reports.
    pub async fn commit(&mut self) {
        let (request, provider, notes) = match plan_commit(&self.state) {
            Ok(plan) => plan,
            Err(e) => {
                self.dispatch(WorkflowAction::CommitRejected(e));
                return;
            }
        };

        self.dispatch(WorkflowAction::CommitStarted);

        let deps = self.deps.clone();
        let mut guard = CommitGuard {
            state: &mut self.state,
            request,
            saved: None,
            settled: false,
        };
        let action = run_commit(&deps, &guard.request, &provider, notes, &mut guard.saved).await;
        guard.settle(action);
    }
}

fn apply(state: &mut WorkflowState, action: WorkflowAction) {
    let current = std::mem::take(state);
    *state = reduce(current, action);
}

/// Allocate, save, then mark matched; records the saved match in `saved`
async fn run_commit(
    deps: &WorkflowDeps,
    request: &Request,
    provider: &Provider,
    notes: String,
    saved: &mut Option<(SerialNumber, String)>,
) -> WorkflowAction {
    let serial = match deps.allocator.allocate(Namespace::Match).await {
        Ok(serial) => serial,
        Err(e) => {
            tracing::error!("Match serial allocation failed: {}", e);
            return WorkflowAction::CommitFailed(e.into());
        }
    };

    let record = Match::new(serial, request, provider, notes);
    let match_id = match deps.matches.save(&record).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!("Failed to save match {}: {}", serial.value(), e);
            return WorkflowAction::CommitFailed(WorkflowError::Store(format!(
                "failed to create match: {}",
                e
            )));
        }
    };
    *saved = Some((serial, match_id.clone()));

    tracing::info!(
        "Created match {} linking request {} to provider {}",
        serial.value(),
        request.serial_number.value(),
        provider.serial_number.value()
    );

    match deps
        .requests
        .update_status(&request.id, RequestStatus::Matched)
        .await
    {
        Ok(()) => WorkflowAction::Committed { serial },
        Err(e) => {
            tracing::warn!(
                "Match {} saved but request {} was not marked matched: {}",
                serial.value(),
                request.id,
                e
            );
            WorkflowAction::PartiallyCommitted(PartialCommit {
                match_serial: serial,
                match_id,
                request_id: request.id.clone(),
                request_serial: request.serial_number,
                reason: e.to_string(),
            })
        }
    }
}

/// Settles an in-flight commit when its future is dropped
struct CommitGuard<'a> {
    state: &'a mut WorkflowState,
    request: Request,
    saved: Option<(SerialNumber, String)>,
    settled: bool,
}

impl CommitGuard<'_> {
    fn settle(mut self, action: WorkflowAction) {
        apply(self.state, action);
        self.settled = true;
    }
}

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let action = match self.saved.take() {
            Some((serial, match_id)) => {
                tracing::warn!(
                    "Commit of match {} interrupted before request {} was marked matched",
                    serial.value(),
                    self.request.id
                );
                WorkflowAction::PartiallyCommitted(PartialCommit {
                    match_serial: serial,
                    match_id,
                    request_id: self.request.id.clone(),
                    request_serial: self.request.serial_number,
                    reason: "commit interrupted".to_string(),
                })
            }
            None => {
                tracing::warn!(
                    "Commit for request {} interrupted before the match was saved",
                    self.request.id
                );
                WorkflowAction::CommitFailed(WorkflowError::Store(
                    "commit interrupted before the match was saved".to_string(),
                ))
            }
        };
        apply(self.state, action);
    }
}
