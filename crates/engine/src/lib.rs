pub mod approval;
pub mod audit_log;
pub mod builder;
pub mod catalog;
pub mod dedup;
pub mod error;
pub mod guard;
pub mod metrics;
pub mod orchestrator;
pub mod ratelimit;
pub mod report;
pub mod retry;

pub use approval::{ApprovalGate, ApprovalTicket, DEADLINE_ACTOR};
pub use audit_log::AuditLog;
pub use builder::OrchestratorBuilder;
pub use catalog::{PolicyCatalog, load_policy, parse_policy_toml, parse_policy_yaml};
pub use dedup::DedupWindow;
pub use error::EngineError;
pub use guard::{
    Attempted, CircuitBreakerConfig, CircuitSnapshot, CircuitState, DependencyGuard, ErrorObserver,
    GuardError,
};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use orchestrator::{
    RemediationOrchestrator, SYSTEM_ACTOR, SweepReport, action_context, notify_context,
};
pub use ratelimit::{BucketSpec, GLOBAL_BUCKET, RateLimiter};
pub use report::{Evaluation, RemediationReport};
pub use retry::RetryPolicy;
