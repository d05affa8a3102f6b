pub mod action;
pub mod approval;
pub mod channel;
pub mod error;
pub mod issue;
pub mod notification;
pub mod outcome;
pub mod policy;
pub mod request;
pub mod severity;

pub use action::{
    ActionConfig, ActionParameters, CircuitBreakerParameters, RemediationAction,
    RestartPodParameters, RollbackParameters, ScaleUpParameters,
};
pub use approval::{ApprovalDecision, ApprovalRecord, ChannelDelivery};
pub use channel::{ChannelKind, NotificationChannel};
pub use error::CoreError;
pub use issue::{Issue, IssueReport, compute_signature};
pub use notification::Notification;
pub use outcome::{ExecutionOutcome, Outcome};
pub use policy::{CircuitBreakerOverride, CircuitBreakerSettings, PolicyConfig, RetrySettings};
pub use request::{RemediationRequest, RequestState, StateChange};
pub use severity::Severity;
