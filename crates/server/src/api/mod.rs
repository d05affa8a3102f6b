pub mod approvals;
pub mod audit;
pub mod catalog;
pub mod circuit_breakers;
pub mod health;
pub mod issues;
pub mod requests;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use remedy_engine::RemediationOrchestrator;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::ingest::IngestQueue;

/// Actor recorded when an API caller does not name one.
pub const DEFAULT_ACTOR: &str = "api";

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RemediationOrchestrator>,
    pub ingest: IngestQueue,
    /// Policy file re-read by `POST /admin/catalog/reload`.
    pub policy_path: Option<PathBuf>,
}

/// Optional `{"actor": "..."}` body for operator actions.
#[derive(Debug, Default, Deserialize)]
pub struct ActorBody {
    #[serde(default)]
    pub actor: Option<String>,
}

impl ActorBody {
    pub fn actor(&self) -> &str {
        self.actor
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(DEFAULT_ACTOR)
    }
}

/// Build the Axum router with all API routes and middleware.
pub fn router(state: AppState) -> Router {
    let issues = Router::new()
        .route("/v1/issues", post(issues::submit))
        .route("/v1/issues/evaluate", post(issues::evaluate))
        // Signatures may contain '/'.
        .route("/v1/issues/{*signature}", delete(issues::resolve));

    let requests = Router::new()
        .route("/v1/requests", get(requests::list))
        .route("/v1/requests/{id}", get(requests::get))
        .route("/v1/requests/{id}/rollback", post(requests::rollback));

    let approvals = Router::new()
        .route("/v1/approvals", get(approvals::list_pending))
        .route("/v1/approvals/{request_id}", get(approvals::get))
        .route("/v1/approvals/{request_id}/approve", post(approvals::approve))
        .route("/v1/approvals/{request_id}/reject", post(approvals::reject));

    let admin = Router::new()
        .route(
            "/admin/circuit-breakers",
            get(circuit_breakers::list_circuit_breakers),
        )
        .route(
            "/admin/circuit-breakers/reset",
            post(circuit_breakers::reset_all),
        )
        .route(
            "/admin/circuit-breakers/{context}/reset",
            post(circuit_breakers::reset_circuit_breaker),
        )
        .route("/admin/catalog", get(catalog::show))
        .route("/admin/catalog/reload", post(catalog::reload));

    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        .route("/v1/audit", get(audit::query))
        .merge(issues)
        .merge(requests)
        .merge(approvals)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
