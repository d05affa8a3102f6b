use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use remedy_core::{Issue, IssueReport};
use remedy_engine::Evaluation;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{AppState, DEFAULT_ACTOR};
use crate::error::ServerError;

#[derive(Debug, Default, Deserialize)]
pub struct SubmitParams {
    /// Handle inline and return the report instead of queueing.
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveParams {
    #[serde(default)]
    pub actor: Option<String>,
}

fn into_issue(report: IssueReport) -> Result<Issue, ServerError> {
    report
        .into_issue()
        .map_err(|e| ServerError::BadRequest(e.to_string()))
}

/// `POST /v1/issues` -- queue an issue for remediation.
///
/// Returns `202 Accepted` once queued. With `?wait=true` the terminal report
/// is returned; this may block for as long as an approval is pending. The
/// handling task keeps running if the client disconnects.
pub async fn submit(
    State(state): State<AppState>,
    Query(params): Query<SubmitParams>,
    Json(report): Json<IssueReport>,
) -> Result<Response, ServerError> {
    let issue = into_issue(report)?;
    if params.wait {
        let report = state.ingest.handle_now(issue).await?;
        return Ok(Json(report).into_response());
    }

    let body = json!({
        "accepted": true,
        "issue_id": issue.id,
        "signature": issue.signature,
    });
    state.ingest.submit(issue)?;
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}

/// `POST /v1/issues/evaluate` -- dry run; nothing is recorded.
pub async fn evaluate(
    State(state): State<AppState>,
    Json(report): Json<IssueReport>,
) -> Result<Json<Evaluation>, ServerError> {
    let issue = into_issue(report)?;
    Ok(Json(state.orchestrator.evaluate(&issue)))
}

/// `DELETE /v1/issues/{signature}` -- the issue cleared; cancel pending approvals.
pub async fn resolve(
    State(state): State<AppState>,
    Path(signature): Path<String>,
    Query(params): Query<ResolveParams>,
) -> Json<serde_json::Value> {
    let actor = params.actor.as_deref().unwrap_or(DEFAULT_ACTOR);
    let cancelled = state.orchestrator.resolve_issue(&signature, actor);
    info!(%signature, actor, cancelled, "issue resolved via API");
    Json(json!({
        "signature": signature,
        "cancelled": cancelled,
    }))
}
