use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use super::AppState;

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "pending_approvals": state.orchestrator.pending_approvals().len(),
    }))
}

/// `GET /metrics` -- engine counters and ingest queue stats.
pub async fn metrics(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "engine": state.orchestrator.metrics(),
        "ingest": state.ingest.stats(),
    }))
}
