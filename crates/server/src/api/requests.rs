use axum::Json;
use axum::extract::{Path, State};
use remedy_core::RemediationRequest;
use remedy_engine::RemediationReport;
use serde_json::{Value, json};
use uuid::Uuid;

use super::{ActorBody, AppState};
use crate::error::ServerError;

/// `GET /v1/requests` -- tracked requests, newest first.
pub async fn list(State(state): State<AppState>) -> Json<Value> {
    let mut requests = state.orchestrator.requests();
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let count = requests.len();
    Json(json!({ "requests": requests, "count": count }))
}

/// `GET /v1/requests/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RemediationRequest>, ServerError> {
    state
        .orchestrator
        .request(id)
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("request {id}")))
}

/// `POST /v1/requests/{id}/rollback`
pub async fn rollback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ActorBody>>,
) -> Result<Json<RemediationReport>, ServerError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let report = state.orchestrator.rollback(id, body.actor()).await?;
    Ok(Json(report))
}
