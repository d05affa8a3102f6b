use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use remedy_core::{
    ApprovalDecision, ApprovalRecord, ChannelDelivery, NotificationChannel, RemediationRequest,
};
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;

/// Actor recorded when a deadline settles an approval.
pub const DEADLINE_ACTOR: &str = "system:deadline";

struct ApprovalSlot {
    record: ApprovalRecord,
    tx: watch::Sender<ApprovalDecision>,
    deadline: Instant,
}

/// Handle used to wait for the decision on one approval.
#[derive(Debug)]
pub struct ApprovalTicket {
    request_id: Uuid,
    rx: watch::Receiver<ApprovalDecision>,
    deadline: Instant,
}

impl ApprovalTicket {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }
}

/// Pending/approved/rejected/timed-out lifecycle of human sign-off.
///
/// One record per request, keyed by request id. [`decide`](Self::decide)
/// is the single mutation point for human decisions; deadlines and
/// cancellation settle records through the same path.
pub struct ApprovalGate {
    slots: DashMap<Uuid, ApprovalSlot>,
    default_timeout: RwLock<Duration>,
}

impl ApprovalGate {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            default_timeout: RwLock::new(default_timeout),
        }
    }

    pub fn default_timeout(&self) -> Duration {
        *self.default_timeout.read()
    }

    /// Applies to approvals requested from now on.
    pub fn set_default_timeout(&self, timeout: Duration) {
        *self.default_timeout.write() = timeout;
    }

    /// Open an approval for `request` and notify every channel.
    ///
    /// The deadline is the smallest channel timeout, or the default timeout
    /// when `channels` is empty. It starts before delivery, and the record
    /// is visible (and decidable) while notifications are in flight.
    /// Delivery is best effort: failures are recorded on the record.
    pub async fn request_approval<F, Fut>(
        &self,
        request: &RemediationRequest,
        channels: &[NotificationChannel],
        deliver: F,
    ) -> ApprovalTicket
    where
        F: Fn(NotificationChannel, ApprovalRecord) -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        let timeout = channels
            .iter()
            .map(|c| c.timeout_seconds)
            .min()
            .map_or_else(|| self.default_timeout(), Duration::from_secs);
        let created_at = Utc::now();
        let deadline_at = created_at
            .checked_add_signed(TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let deadline = Instant::now() + timeout;

        let record = ApprovalRecord {
            request_id: request.id,
            action: request.action.clone(),
            issue_signature: request.signature.clone(),
            channels: channels.iter().map(|c| c.name.clone()).collect(),
            deliveries: Vec::new(),
            created_at,
            deadline: deadline_at,
            decision: ApprovalDecision::Pending,
            decided_by: None,
            decided_at: None,
        };
        let (tx, rx) = watch::channel(ApprovalDecision::Pending);
        self.slots.insert(
            request.id,
            ApprovalSlot {
                record: record.clone(),
                tx,
                deadline,
            },
        );
        info!(
            request_id = %request.id,
            action = %request.action,
            channels = channels.len(),
            timeout_secs = timeout.as_secs(),
            "approval requested"
        );

        let request_id = request.id;
        let deliveries = join_all(channels.iter().map(|channel| {
            let name = channel.name.clone();
            let sent = deliver(channel.clone(), record.clone());
            async move {
                match sent.await {
                    Ok(()) => ChannelDelivery {
                        channel: name,
                        delivered: true,
                        error: None,
                    },
                    Err(error) => {
                        warn!(request_id = %request_id, channel = %name, error = %error, "approval notification failed");
                        ChannelDelivery {
                            channel: name,
                            delivered: false,
                            error: Some(error),
                        }
                    }
                }
            }
        }))
        .await;

        if let Some(mut slot) = self.slots.get_mut(&request.id) {
            slot.record.deliveries = deliveries;
        }

        ApprovalTicket {
            request_id: request.id,
            rx,
            deadline,
        }
    }

    /// Suspend until the approval is settled or its deadline passes, then
    /// return the final record. A passed deadline settles it as `TimedOut`.
    pub async fn wait(&self, ticket: ApprovalTicket) -> Result<ApprovalRecord, EngineError> {
        let ApprovalTicket {
            request_id,
            mut rx,
            deadline,
        } = ticket;

        let timed_out = tokio::time::timeout_at(deadline, rx.wait_for(|d| d.is_terminal()))
            .await
            .is_err();
        if timed_out {
            self.expire(request_id);
        }
        self.get(request_id)
            .ok_or(EngineError::ApprovalNotFound(request_id))
    }

    /// Record a human decision. Only `Approved` and `Rejected` are accepted.
    ///
    /// Idempotent: deciding an already settled approval returns the existing
    /// record unchanged. A decision arriving after the deadline settles the
    /// record as `TimedOut`.
    pub fn decide(
        &self,
        request_id: Uuid,
        decision: ApprovalDecision,
        actor: &str,
    ) -> Result<ApprovalRecord, EngineError> {
        if !matches!(
            decision,
            ApprovalDecision::Approved | ApprovalDecision::Rejected
        ) {
            return Err(EngineError::InvalidDecision(decision.to_string()));
        }
        self.settle(request_id, decision, actor)
            .ok_or(EngineError::ApprovalNotFound(request_id))
    }

    /// Cancel a pending approval (the issue was resolved).
    pub fn cancel(&self, request_id: Uuid, actor: &str) -> Option<ApprovalRecord> {
        self.settle(request_id, ApprovalDecision::Cancelled, actor)
    }

    /// Settle a pending approval as `TimedOut`.
    pub fn expire(&self, request_id: Uuid) -> Option<ApprovalRecord> {
        self.settle(request_id, ApprovalDecision::TimedOut, DEADLINE_ACTOR)
    }

    /// Settle an approval nobody is waiting on any more: `TimedOut` once its
    /// deadline has passed, `Cancelled` before that.
    pub fn abandon(&self, request_id: Uuid, actor: &str) -> Option<ApprovalRecord> {
        let overdue = self
            .slots
            .get(&request_id)
            .is_some_and(|slot| Instant::now() >= slot.deadline);
        if overdue {
            self.expire(request_id)
        } else {
            self.cancel(request_id, actor)
        }
    }

    /// Settle every pending approval whose deadline has passed as
    /// `TimedOut`. Returns the number of records expired.
    pub fn expire_overdue(&self) -> usize {
        let now = Instant::now();
        let overdue: Vec<Uuid> = self
            .slots
            .iter()
            .filter(|s| s.record.is_pending() && now >= s.deadline)
            .map(|s| *s.key())
            .collect();
        overdue
            .into_iter()
            .filter_map(|id| self.expire(id))
            .filter(|record| record.decision == ApprovalDecision::TimedOut)
            .count()
    }

    fn settle(
        &self,
        request_id: Uuid,
        decision: ApprovalDecision,
        actor: &str,
    ) -> Option<ApprovalRecord> {
        let mut slot = self.slots.get_mut(&request_id)?;
        if slot.record.decision.is_terminal() {
            return Some(slot.record.clone());
        }

        let (decision, actor) = if Instant::now() >= slot.deadline
            && matches!(
                decision,
                ApprovalDecision::Approved | ApprovalDecision::Rejected
            ) {
            (ApprovalDecision::TimedOut, DEADLINE_ACTOR)
        } else {
            (decision, actor)
        };

        slot.record.decision = decision;
        slot.record.decided_by = Some(actor.to_owned());
        slot.record.decided_at = Some(Utc::now());
        slot.tx.send_replace(decision);
        info!(request_id = %request_id, decision = %decision, actor, "approval settled");
        Some(slot.record.clone())
    }

    pub fn get(&self, request_id: Uuid) -> Option<ApprovalRecord> {
        self.slots.get(&request_id).map(|s| s.record.clone())
    }

    /// Pending approvals, oldest first.
    pub fn pending(&self) -> Vec<ApprovalRecord> {
        let mut pending: Vec<ApprovalRecord> = self
            .slots
            .iter()
            .filter(|s| s.record.is_pending())
            .map(|s| s.record.clone())
            .collect();
        pending.sort_by_key(|r| r.created_at);
        pending
    }

    /// Request ids of pending approvals for an issue signature.
    pub fn pending_for_signature(&self, signature: &str) -> Vec<Uuid> {
        self.slots
            .iter()
            .filter(|s| s.record.is_pending() && s.record.issue_signature == signature)
            .map(|s| *s.key())
            .collect()
    }

    /// Drop settled records decided more than `retention` ago.
    pub fn purge_decided(&self, retention: Duration) -> usize {
        let cutoff = Utc::now()
            .checked_sub_signed(TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let before = self.slots.len();
        self.slots
            .retain(|_, slot| slot.record.decided_at.is_none_or(|at| at > cutoff));
        before.saturating_sub(self.slots.len())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use remedy_core::{ActionConfig, ChannelKind, Issue, RemediationAction, Severity};

    use super::*;

    fn request() -> RemediationRequest {
        let issue = Issue::new("svc-A/errors", "error_rate_spike", Severity::High);
        let action = RemediationAction::from_config(ActionConfig::new(
            "rollback_deployment",
            Severity::High,
            ["error_rate_spike"],
        ))
        .unwrap();
        RemediationRequest::new(&issue, &action)
    }

    fn channel(name: &str, timeout: u64) -> NotificationChannel {
        NotificationChannel::new(name, ChannelKind::Log).with_timeout_seconds(timeout)
    }

    async fn delivered(_: NotificationChannel, _: ApprovalRecord) -> Result<(), String> {
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn approve_before_deadline() {
        let gate = Arc::new(ApprovalGate::new(Duration::from_secs(1800)));
        let req = request();
        let ticket = gate
            .request_approval(&req, &[channel("ops", 600)], delivered)
            .await;

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.wait(ticket).await })
        };
        tokio::time::advance(Duration::from_secs(30)).await;
        gate.decide(req.id, ApprovalDecision::Approved, "alice").unwrap();

        let record = waiter.await.unwrap().unwrap();
        assert_eq!(record.decision, ApprovalDecision::Approved);
        assert_eq!(record.decided_by.as_deref(), Some("alice"));
        assert!(record.deliveries[0].delivered);
    }

    #[tokio::test(start_paused = true)]
    async fn no_decision_times_out_at_min_channel_timeout() {
        let gate = ApprovalGate::new(Duration::from_secs(1800));
        let req = request();
        let start = Instant::now();
        let ticket = gate
            .request_approval(&req, &[channel("a", 900), channel("b", 300)], delivered)
            .await;

        let record = gate.wait(ticket).await.unwrap();
        assert_eq!(record.decision, ApprovalDecision::TimedOut);
        assert_eq!(record.decided_by.as_deref(), Some(DEADLINE_ACTOR));
        assert_eq!(start.elapsed(), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn no_channels_uses_default_timeout() {
        let gate = ApprovalGate::new(Duration::from_secs(42));
        let req = request();
        let start = Instant::now();
        let ticket = gate.request_approval(&req, &[], delivered).await;
        let record = gate.wait(ticket).await.unwrap();
        assert_eq!(record.decision, ApprovalDecision::TimedOut);
        assert_eq!(start.elapsed(), Duration::from_secs(42));
        assert!(record.channels.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_deliveries_are_recorded() {
        let gate = ApprovalGate::new(Duration::from_secs(60));
        let req = request();
        gate.request_approval(&req, &[channel("ops", 60)], |_, _| async {
            Err("connection refused".to_owned())
        })
        .await;

        let record = gate.get(req.id).unwrap();
        assert!(!record.deliveries[0].delivered);
        assert_eq!(record.deliveries[0].error.as_deref(), Some("connection refused"));
        assert!(record.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn decide_is_idempotent() {
        let gate = ApprovalGate::new(Duration::from_secs(60));
        let req = request();
        gate.request_approval(&req, &[], delivered).await;

        let first = gate
            .decide(req.id, ApprovalDecision::Rejected, "bob")
            .unwrap();
        let second = gate
            .decide(req.id, ApprovalDecision::Approved, "alice")
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(second.decision, ApprovalDecision::Rejected);
    }

    #[tokio::test(start_paused = true)]
    async fn late_decision_is_timed_out() {
        let gate = ApprovalGate::new(Duration::from_secs(60));
        let req = request();
        gate.request_approval(&req, &[], delivered).await;
        tokio::time::advance(Duration::from_secs(61)).await;

        let record = gate
            .decide(req.id, ApprovalDecision::Approved, "alice")
            .unwrap();
        assert_eq!(record.decision, ApprovalDecision::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_and_unknown_decisions() {
        let gate = ApprovalGate::new(Duration::from_secs(60));
        assert!(matches!(
            gate.decide(Uuid::now_v7(), ApprovalDecision::Approved, "alice"),
            Err(EngineError::ApprovalNotFound(_))
        ));
        assert!(matches!(
            gate.decide(Uuid::now_v7(), ApprovalDecision::TimedOut, "alice"),
            Err(EngineError::InvalidDecision(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_wakes_waiter() {
        let gate = Arc::new(ApprovalGate::new(Duration::from_secs(600)));
        let req = request();
        let ticket = gate.request_approval(&req, &[], delivered).await;
        assert_eq!(gate.pending_for_signature("svc-A/errors"), vec![req.id]);

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.wait(ticket).await })
        };
        tokio::task::yield_now().await;
        gate.cancel(req.id, "resolver").unwrap();

        let record = waiter.await.unwrap().unwrap();
        assert_eq!(record.decision, ApprovalDecision::Cancelled);
        assert!(gate.pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn overdue_approvals_expire_without_a_waiter() {
        let gate = ApprovalGate::new(Duration::from_secs(60));
        let stale = request();
        let fresh = request();
        gate.request_approval(&stale, &[channel("ops", 30)], delivered)
            .await;
        gate.request_approval(&fresh, &[], delivered).await;

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(gate.expire_overdue(), 1);
        let record = gate.get(stale.id).unwrap();
        assert_eq!(record.decision, ApprovalDecision::TimedOut);
        assert_eq!(record.decided_by.as_deref(), Some(DEADLINE_ACTOR));
        assert_eq!(gate.pending().len(), 1);
        assert_eq!(gate.expire_overdue(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn abandon_depends_on_the_deadline() {
        let gate = ApprovalGate::new(Duration::from_secs(60));
        let early = request();
        let late = request();
        gate.request_approval(&early, &[], delivered).await;
        assert_eq!(
            gate.abandon(early.id, "system").unwrap().decision,
            ApprovalDecision::Cancelled
        );

        gate.request_approval(&late, &[], delivered).await;
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(
            gate.abandon(late.id, "system").unwrap().decision,
            ApprovalDecision::TimedOut
        );
        assert!(gate.abandon(Uuid::now_v7(), "system").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_keeps_pending_records() {
        let gate = ApprovalGate::new(Duration::from_secs(60));
        let decided = request();
        let open = request();
        gate.request_approval(&decided, &[], delivered).await;
        gate.request_approval(&open, &[], delivered).await;
        gate.decide(decided.id, ApprovalDecision::Approved, "alice")
            .unwrap();

        assert_eq!(gate.purge_decided(Duration::ZERO), 1);
        assert_eq!(gate.len(), 1);
        assert!(gate.get(open.id).is_some());
    }
}
