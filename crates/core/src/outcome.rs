use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Terminal outcome recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// No enabled action in the catalog applies to the issue category.
    NoApplicableAction,
    Deduplicated,
    RateLimited,
    ApprovalRejected,
    ApprovalTimedOut,
    ApprovalCancelled,
    Succeeded,
    Failed,
    RolledBack,
    RollbackFailed,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoApplicableAction => "NoApplicableAction",
            Self::Deduplicated => "Deduplicated",
            Self::RateLimited => "RateLimited",
            Self::ApprovalRejected => "ApprovalRejected",
            Self::ApprovalTimedOut => "ApprovalTimedOut",
            Self::ApprovalCancelled => "ApprovalCancelled",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::RolledBack => "RolledBack",
            Self::RollbackFailed => "RollbackFailed",
        }
    }

    /// Whether the policy let the action reach an executor.
    pub fn allowed(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::RolledBack | Self::RollbackFailed
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let outcome = match s {
            "NoApplicableAction" => Self::NoApplicableAction,
            "Deduplicated" => Self::Deduplicated,
            "RateLimited" => Self::RateLimited,
            "ApprovalRejected" => Self::ApprovalRejected,
            "ApprovalTimedOut" => Self::ApprovalTimedOut,
            "ApprovalCancelled" => Self::ApprovalCancelled,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            "RolledBack" => Self::RolledBack,
            "RollbackFailed" => Self::RollbackFailed,
            other => {
                return Err(CoreError::InvalidPolicy(format!("unknown outcome: {other}")));
            }
        };
        Ok(outcome)
    }
}

/// What an executor reports back after running an action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    #[serde(default)]
    pub details: serde_json::Value,
}

impl ExecutionOutcome {
    pub fn new(details: serde_json::Value) -> Self {
        Self { details }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_executed_outcomes_are_allowed() {
        assert!(Outcome::Succeeded.allowed());
        assert!(Outcome::Failed.allowed());
        assert!(!Outcome::Deduplicated.allowed());
        assert!(!Outcome::ApprovalTimedOut.allowed());
        assert!(!Outcome::NoApplicableAction.allowed());
    }

    #[test]
    fn wire_name_round_trips_through_from_str() {
        for outcome in [
            Outcome::NoApplicableAction,
            Outcome::ApprovalCancelled,
            Outcome::RollbackFailed,
        ] {
            assert_eq!(outcome.as_str().parse::<Outcome>().unwrap(), outcome);
            assert_eq!(
                serde_json::to_value(outcome).unwrap(),
                serde_json::Value::String(outcome.as_str().to_owned())
            );
        }
        assert!("Exploded".parse::<Outcome>().is_err());
    }
}
