use axum::Json;
use axum::extract::State;
use remedy_engine::{PolicyCatalog, load_policy};
use serde_json::{Value, json};
use tracing::info;

use super::AppState;
use crate::error::ServerError;

/// `GET /admin/catalog` -- the active actions and channels.
pub async fn show(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.orchestrator.catalog().as_ref()))
}

/// `POST /admin/catalog/reload` -- re-read the policy file and swap the catalog.
///
/// An invalid document leaves the active catalog untouched.
pub async fn reload(State(state): State<AppState>) -> Result<Json<Value>, ServerError> {
    let Some(path) = state.policy_path.as_deref() else {
        return Err(ServerError::BadRequest(
            "no policy file configured to reload".into(),
        ));
    };
    let policy = load_policy(path)?;
    let catalog = PolicyCatalog::from_config(&policy)?;
    let actions = catalog.actions().len();
    let channels = catalog.channels().len();
    state.orchestrator.reload_catalog(catalog);
    info!(path = %path.display(), actions, channels, "catalog reloaded via API");
    Ok(Json(json!({
        "reloaded": true,
        "actions": actions,
        "channels": channels,
    })))
}
