use axum::Json;
use axum::extract::{Query, State};
use remedy_audit::{AuditPage, AuditQuery};

use super::AppState;
use crate::error::ServerError;

/// `GET /v1/audit` -- query the audit trail.
pub async fn query(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditPage>, ServerError> {
    Ok(Json(state.orchestrator.query_audit(&query).await?))
}
