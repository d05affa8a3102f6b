use axum::Json;
use axum::extract::{Path, State};
use serde_json::{Value, json};
use tracing::info;

use super::AppState;
use crate::error::ServerError;

/// `GET /admin/circuit-breakers` -- every circuit the guard has seen.
pub async fn list_circuit_breakers(State(state): State<AppState>) -> Json<Value> {
    let mut breakers = state.orchestrator.circuit_breakers();
    breakers.sort_by(|a, b| a.context.cmp(&b.context));
    Json(json!({ "circuit_breakers": breakers }))
}

/// `POST /admin/circuit-breakers/{context}/reset` -- force one circuit closed.
pub async fn reset_circuit_breaker(
    State(state): State<AppState>,
    Path(context): Path<String>,
) -> Result<Json<Value>, ServerError> {
    if !state.orchestrator.reset_circuit_breaker(&context) {
        return Err(ServerError::NotFound(format!("circuit breaker {context}")));
    }
    info!(%context, "circuit breaker reset via API");
    Ok(Json(json!({ "context": context, "state": "closed" })))
}

/// `POST /admin/circuit-breakers/reset`
pub async fn reset_all(State(state): State<AppState>) -> Json<Value> {
    state.orchestrator.reset_all_circuit_breakers();
    info!("all circuit breakers reset via API");
    Json(json!({ "reset": true }))
}
