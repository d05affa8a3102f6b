use axum::Json;
use axum::extract::{Path, State};
use remedy_core::ApprovalRecord;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::{ActorBody, AppState};
use crate::error::ServerError;

/// `GET /v1/approvals` -- approvals still waiting for a decision.
pub async fn list_pending(State(state): State<AppState>) -> Json<Value> {
    let approvals = state.orchestrator.pending_approvals();
    let count = approvals.len();
    Json(json!({ "approvals": approvals, "count": count }))
}

/// `GET /v1/approvals/{request_id}`
pub async fn get(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<ApprovalRecord>, ServerError> {
    state
        .orchestrator
        .approval(request_id)
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("approval {request_id}")))
}

fn decide(
    state: &AppState,
    request_id: Uuid,
    approve: bool,
    body: Option<Json<ActorBody>>,
) -> Result<Json<ApprovalRecord>, ServerError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let actor = body.actor();
    let record = state
        .orchestrator
        .decide_approval(request_id, approve, actor)?;
    info!(
        %request_id,
        actor,
        decision = record.decision.as_str(),
        "approval decided via API"
    );
    Ok(Json(record))
}

/// `POST /v1/approvals/{request_id}/approve`
pub async fn approve(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    body: Option<Json<ActorBody>>,
) -> Result<Json<ApprovalRecord>, ServerError> {
    decide(&state, request_id, true, body)
}

/// `POST /v1/approvals/{request_id}/reject`
pub async fn reject(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    body: Option<Json<ActorBody>>,
) -> Result<Json<ApprovalRecord>, ServerError> {
    decide(&state, request_id, false, body)
}
