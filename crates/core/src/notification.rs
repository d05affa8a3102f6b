use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::issue::Issue;
use crate::outcome::Outcome;
use crate::severity::Severity;

/// A message delivered to a notification channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A risky action waits for a human decision.
    ApprovalRequested {
        request_id: Uuid,
        action: String,
        action_severity: Severity,
        description: String,
        issue: Issue,
        deadline: DateTime<Utc>,
    },
    /// A high-risk remediation reached a terminal outcome.
    OutcomeReport {
        request_id: Option<Uuid>,
        action: String,
        action_severity: Severity,
        issue: Issue,
        outcome: Outcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApprovalRequested { .. } => "approval_requested",
            Self::OutcomeReport { .. } => "outcome_report",
        }
    }

    /// One-line human readable text, used by chat-style channels.
    pub fn summary(&self) -> String {
        match self {
            Self::ApprovalRequested {
                request_id,
                action,
                action_severity,
                issue,
                deadline,
                ..
            } => format!(
                "[{action_severity}] approval needed for {action} on {} ({}), request {request_id}, expires {}",
                issue.signature,
                issue.category,
                deadline.to_rfc3339()
            ),
            Self::OutcomeReport {
                action,
                action_severity,
                issue,
                outcome,
                detail,
                ..
            } => {
                let mut text = format!(
                    "[{action_severity}] {action} on {} finished: {outcome}",
                    issue.signature
                );
                if let Some(detail) = detail {
                    text.push_str(" (");
                    text.push_str(detail);
                    text.push(')');
                }
                text
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_summary_mentions_action_and_signature() {
        let issue = Issue::new("svc-B/bad_deploy", "deployment_failure", Severity::High);
        let n = Notification::ApprovalRequested {
            request_id: Uuid::nil(),
            action: "rollback_deployment".into(),
            action_severity: Severity::High,
            description: String::new(),
            issue,
            deadline: Utc::now(),
        };
        let text = n.summary();
        assert!(text.contains("rollback_deployment"));
        assert!(text.contains("svc-B/bad_deploy"));
        assert_eq!(n.kind(), "approval_requested");
    }

    #[test]
    fn outcome_report_serializes_type_tag() {
        let issue = Issue::new("sig", "cat", Severity::Critical);
        let n = Notification::OutcomeReport {
            request_id: None,
            action: "restart_pod".into(),
            action_severity: Severity::Critical,
            issue,
            outcome: Outcome::Failed,
            detail: Some("circuit open".into()),
        };
        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["type"], "outcome_report");
        assert_eq!(value["outcome"], "Failed");
        assert!(n.summary().ends_with("(circuit open)"));
    }
}
