use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::RemediationAction;
use crate::error::CoreError;
use crate::issue::Issue;

/// Lifecycle state of a [`RemediationRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Created,
    Deduplicated,
    RateLimited,
    AwaitingApproval,
    Approved,
    Rejected,
    TimedOut,
    Cancelled,
    Executing,
    Succeeded,
    Failed,
}

impl RequestState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Deduplicated => "deduplicated",
            Self::RateLimited => "rate_limited",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
            Self::Executing => "executing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Deduplicated
                | Self::RateLimited
                | Self::Rejected
                | Self::TimedOut
                | Self::Cancelled
                | Self::Succeeded
                | Self::Failed
        )
    }

    /// Whether `next` directly follows `self` in the request lifecycle.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Created,
                Self::Deduplicated | Self::RateLimited | Self::AwaitingApproval | Self::Executing
            ) | (
                Self::AwaitingApproval,
                Self::Approved | Self::Rejected | Self::TimedOut | Self::Cancelled
            ) | (Self::Approved, Self::Executing)
                | (Self::Executing, Self::Succeeded | Self::Failed)
        )
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub state: RequestState,
    pub at: DateTime<Utc>,
}

/// The working unit for one (issue, chosen action) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationRequest {
    pub id: Uuid,
    pub issue_id: String,
    pub signature: String,
    pub category: String,
    pub action: String,
    pub state: RequestState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Executor attempts used, once execution has been tried.
    #[serde(default)]
    pub attempts: Option<u32>,
    /// Executor result details of a successful run.
    #[serde(default)]
    pub execution: Option<serde_json::Value>,
    /// Set once the executed action has been rolled back.
    #[serde(default)]
    pub rolled_back_at: Option<DateTime<Utc>>,
    pub history: Vec<StateChange>,
}

impl RemediationRequest {
    pub fn new(issue: &Issue, action: &RemediationAction) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            issue_id: issue.id.clone(),
            signature: issue.signature.clone(),
            category: issue.category.clone(),
            action: action.name.clone(),
            state: RequestState::Created,
            created_at: now,
            updated_at: now,
            attempts: None,
            execution: None,
            rolled_back_at: None,
            history: vec![StateChange {
                state: RequestState::Created,
                at: now,
            }],
        }
    }

    /// Move to `next`, refusing anything that would revisit or skip a state.
    pub fn transition(&mut self, next: RequestState) -> Result<(), CoreError> {
        if !self.state.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        let now = Utc::now();
        self.state = next;
        self.updated_at = now;
        self.history.push(StateChange {
            state: next,
            at: now,
        });
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
