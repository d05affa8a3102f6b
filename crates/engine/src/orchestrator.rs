use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::RwLock;
use remedy_audit::{AuditEntry, AuditPage, AuditQuery};
use remedy_core::{
    ApprovalDecision, ApprovalRecord, ExecutionOutcome, Issue, Notification, NotificationChannel,
    Outcome, RemediationAction, RemediationRequest, RequestState, Severity,
};
use remedy_provider::{Executor, ExecutorRegistry, Notifier, NotifierRegistry};
use serde::Serialize;
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::approval::{ApprovalGate, DEADLINE_ACTOR};
use crate::audit_log::AuditLog;
use crate::catalog::PolicyCatalog;
use crate::dedup::DedupWindow;
use crate::error::EngineError;
use crate::guard::{CircuitSnapshot, CircuitState, DependencyGuard, GuardError};
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::ratelimit::RateLimiter;
use crate::report::{Evaluation, RemediationReport};

/// Actor recorded for decisions the engine makes on its own.
pub const SYSTEM_ACTOR: &str = "system";

/// Guard context for an action's executor.
pub fn action_context(action: &str) -> String {
    format!("action:{action}")
}

/// Guard context for a notification channel.
pub fn notify_context(channel: &str) -> String {
    format!("notify:{channel}")
}

pub(crate) struct TrackedRequest {
    request: RemediationRequest,
    issue: Arc<Issue>,
    action: RemediationAction,
    execution: Option<ExecutionOutcome>,
    rolling_back: bool,
}

/// Releases the dedup pair when the request is finished, including when the
/// handling future is dropped.
struct LiveGuard<'a> {
    dedup: &'a DedupWindow,
    signature: &'a str,
    action: &'a str,
}

impl Drop for LiveGuard<'_> {
    fn drop(&mut self) {
        self.dedup.release(self.signature, self.action);
    }
}

/// Settles the request if the handling future is dropped while it waits on
/// an approval, so the request still reaches a terminal state and its audit
/// entry.
struct AwaitingDecision<'a> {
    orchestrator: &'a RemediationOrchestrator,
    request_id: Uuid,
    armed: bool,
}

impl AwaitingDecision<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AwaitingDecision<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.orchestrator.abandon_approval(self.request_id);
        }
    }
}

/// How a request ended, before it is written to audit.
struct Settled {
    outcome: Outcome,
    actor: String,
    attempts: Option<u32>,
    circuit_state: Option<CircuitState>,
    approval: Option<ApprovalRecord>,
    error: Option<String>,
}

impl Settled {
    fn system(outcome: Outcome) -> Self {
        Self {
            outcome,
            actor: SYSTEM_ACTOR.to_owned(),
            attempts: None,
            circuit_state: None,
            approval: None,
            error: None,
        }
    }
}

/// Counts from one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub dedup_evicted: usize,
    pub approvals_expired: usize,
    pub approvals_purged: usize,
    pub requests_purged: usize,
}

/// Drives each issue to a terminal outcome.
///
/// Per issue: catalog match, dedup, rate limit, optional approval,
/// guarded execution, then exactly one audit entry. Issues are handled
/// concurrently; each one is processed sequentially.
pub struct RemediationOrchestrator {
    pub(crate) catalog: RwLock<Arc<PolicyCatalog>>,
    pub(crate) dedup: DedupWindow,
    pub(crate) rate_limiter: RateLimiter,
    pub(crate) approvals: ApprovalGate,
    pub(crate) guard: DependencyGuard,
    pub(crate) audit: AuditLog,
    pub(crate) executors: ExecutorRegistry,
    pub(crate) notifiers: NotifierRegistry,
    pub(crate) requests: DashMap<Uuid, TrackedRequest>,
    pub(crate) metrics: Arc<EngineMetrics>,
}

impl RemediationOrchestrator {
    /// Handle one issue to its terminal outcome.
    ///
    /// Suspends while an approval is pending. Policy refusals are reported
    /// as outcomes; `Err` is reserved for internal faults.
    #[instrument(
        skip_all,
        fields(issue_id = %issue.id, signature = %issue.signature, category = %issue.category)
    )]
    pub async fn handle_issue(&self, issue: Issue) -> Result<RemediationReport, EngineError> {
        self.metrics.increment_received();
        let catalog = self.catalog();
        let issue = Arc::new(issue);

        let Some(action) = catalog.match_actions(&issue).into_iter().next() else {
            info!("no applicable remediation action");
            self.metrics.increment_no_action();
            self.audit
                .record(
                    AuditEntry::new(
                        issue.id.clone(),
                        issue.signature.clone(),
                        Outcome::NoApplicableAction,
                        SYSTEM_ACTOR,
                    )
                    .with_details(json!({
                        "category": issue.category,
                        "severity": issue.severity,
                    })),
                )
                .await;
            return Ok(RemediationReport {
                request_id: None,
                issue_id: issue.id.clone(),
                signature: issue.signature.clone(),
                action: None,
                outcome: Outcome::NoApplicableAction,
                allowed: false,
                attempts: None,
                circuit_state: None,
                approval: None,
                error: None,
            });
        };

        let mut request = RemediationRequest::new(&issue, &action);
        self.requests.insert(
            request.id,
            TrackedRequest {
                request: request.clone(),
                issue: Arc::clone(&issue),
                action: action.clone(),
                execution: None,
                rolling_back: false,
            },
        );
        debug!(request_id = %request.id, action = %action.name, "remediation request created");

        let now = Instant::now();
        if !self.dedup.try_admit(&issue.signature, &action.name, now) {
            info!(action = %action.name, "duplicate trigger suppressed");
            self.metrics.increment_deduplicated();
            self.advance(&mut request, RequestState::Deduplicated)?;
            let settled = Settled::system(Outcome::Deduplicated);
            return Ok(self.finish(&catalog, &issue, &action, &request, settled).await);
        }
        let _live = LiveGuard {
            dedup: &self.dedup,
            signature: &issue.signature,
            action: &action.name,
        };

        if !self.rate_limiter.try_admit_action(&action.name, now) {
            info!(action = %action.name, "rate limit reached");
            self.metrics.increment_rate_limited();
            self.advance(&mut request, RequestState::RateLimited)?;
            let settled = Settled::system(Outcome::RateLimited);
            return Ok(self.finish(&catalog, &issue, &action, &request, settled).await);
        }

        let mut approval = None;
        let mut actor = SYSTEM_ACTOR.to_owned();
        if action.requires_approval {
            self.advance(&mut request, RequestState::AwaitingApproval)?;
            self.metrics.increment_approvals_requested();

            let mut awaiting = AwaitingDecision {
                orchestrator: self,
                request_id: request.id,
                armed: true,
            };
            let channels = catalog.channels_for(action.severity);
            let ticket = self
                .approvals
                .request_approval(&request, &channels, |channel, record| {
                    self.deliver_approval(channel, record, &action, &issue)
                })
                .await;
            let record = self.approvals.wait(ticket).await?;
            awaiting.disarm();
            let decided_by = record
                .decided_by
                .clone()
                .unwrap_or_else(|| DEADLINE_ACTOR.to_owned());

            let denied = match record.decision {
                ApprovalDecision::Approved => None,
                ApprovalDecision::Rejected => {
                    self.metrics.increment_rejected();
                    Some((RequestState::Rejected, Outcome::ApprovalRejected))
                }
                ApprovalDecision::Cancelled => {
                    self.metrics.increment_cancelled();
                    Some((RequestState::Cancelled, Outcome::ApprovalCancelled))
                }
                ApprovalDecision::TimedOut | ApprovalDecision::Pending => {
                    self.metrics.increment_timed_out();
                    Some((RequestState::TimedOut, Outcome::ApprovalTimedOut))
                }
            };

            if let Some((state, outcome)) = denied {
                info!(action = %action.name, decision = %record.decision, "approval not granted");
                self.advance(&mut request, state)?;
                let settled = Settled {
                    actor: decided_by,
                    approval: Some(record),
                    ..Settled::system(outcome)
                };
                return Ok(self.finish(&catalog, &issue, &action, &request, settled).await);
            }

            self.metrics.increment_approved();
            self.advance(&mut request, RequestState::Approved)?;
            actor = decided_by;
            approval = Some(record);
        }

        self.advance(&mut request, RequestState::Executing)?;
        let context = action_context(&action.name);
        let mut settled = match self.executors.get(&action.name) {
            Some(executor) => {
                let executor: &dyn Executor = executor.as_ref();
                let (action_ref, issue_ref) = (&action, issue.as_ref());
                let result = self
                    .guard
                    .call(&context, move || executor.execute(action_ref, issue_ref))
                    .await;
                match result {
                    Ok(done) => {
                        info!(action = %action.name, attempts = done.attempts, "remediation succeeded");
                        self.metrics.increment_executed();
                        request.attempts = Some(done.attempts);
                        request.execution = Some(done.value.details.clone());
                        if let Some(mut tracked) = self.requests.get_mut(&request.id) {
                            tracked.execution = Some(done.value);
                        }
                        self.advance(&mut request, RequestState::Succeeded)?;
                        Settled {
                            attempts: Some(done.attempts),
                            ..Settled::system(Outcome::Succeeded)
                        }
                    }
                    Err(e) => {
                        warn!(action = %action.name, attempts = e.attempts(), error = %e, "remediation failed");
                        self.record_guard_failure(&e);
                        request.attempts = Some(e.attempts());
                        self.advance(&mut request, RequestState::Failed)?;
                        Settled {
                            attempts: Some(e.attempts()),
                            error: Some(e.to_string()),
                            ..Settled::system(Outcome::Failed)
                        }
                    }
                }
            }
            None => {
                warn!(action = %action.name, "no executor registered");
                self.metrics.increment_failed();
                self.advance(&mut request, RequestState::Failed)?;
                Settled {
                    attempts: Some(0),
                    error: Some(format!("no executor registered for {}", action.name)),
                    ..Settled::system(Outcome::Failed)
                }
            }
        };
        settled.circuit_state = Some(self.guard.state(&context));
        settled.actor = actor;
        settled.approval = approval;

        Ok(self.finish(&catalog, &issue, &action, &request, settled).await)
    }

    /// Settle a request whose handler went away mid-approval. The audit
    /// entry is written on a spawned task; outcome notifications are skipped.
    fn abandon_approval(&self, request_id: Uuid) {
        let record = self.approvals.abandon(request_id, SYSTEM_ACTOR);
        let (state, outcome) = match record.as_ref().map(|r| r.decision) {
            Some(ApprovalDecision::TimedOut) => (RequestState::TimedOut, Outcome::ApprovalTimedOut),
            Some(ApprovalDecision::Rejected) => (RequestState::Rejected, Outcome::ApprovalRejected),
            // An approval granted after the handler left is never executed.
            _ => (RequestState::Cancelled, Outcome::ApprovalCancelled),
        };

        let (request, issue, action) = {
            let Some(mut tracked) = self.requests.get_mut(&request_id) else {
                return;
            };
            if tracked.request.state != RequestState::AwaitingApproval {
                return;
            }
            if let Err(e) = tracked.request.transition(state) {
                warn!(request_id = %request_id, error = %e, "could not settle abandoned request");
                return;
            }
            (
                tracked.request.clone(),
                Arc::clone(&tracked.issue),
                tracked.action.clone(),
            )
        };
        match state {
            RequestState::TimedOut => self.metrics.increment_timed_out(),
            RequestState::Rejected => self.metrics.increment_rejected(),
            _ => self.metrics.increment_cancelled(),
        }
        warn!(request_id = %request_id, action = %action.name, %outcome, "approval abandoned by its handler");

        let actor = record
            .as_ref()
            .filter(|r| r.decision != ApprovalDecision::Approved)
            .and_then(|r| r.decided_by.clone())
            .unwrap_or_else(|| SYSTEM_ACTOR.to_owned());
        let mut details = json!({
            "request_state": request.state,
            "action_severity": action.severity,
            "abandoned": true,
        });
        if let Some(record) = &record {
            details["approval"] = json!({
                "decision": record.decision,
                "decided_by": record.decided_by,
                "channels": record.channels,
                "deliveries": record.deliveries,
            });
        }
        let entry = AuditEntry::new(issue.id.clone(), issue.signature.clone(), outcome, actor)
            .with_request(request_id)
            .with_action(action.name.clone())
            .with_details(details);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let audit = self.audit.clone();
                runtime.spawn(async move { audit.record(entry).await });
            }
            Err(_) => {
                error!(request_id = %request_id, %outcome, "no runtime to record the audit entry");
            }
        }
    }

    fn record_guard_failure(&self, error: &GuardError) {
        self.metrics.increment_failed();
        if matches!(error, GuardError::CircuitOpen { .. }) {
            self.metrics.increment_circuit_open();
        }
    }

    fn advance(
        &self,
        request: &mut RemediationRequest,
        next: RequestState,
    ) -> Result<(), EngineError> {
        request.transition(next)?;
        if let Some(mut tracked) = self.requests.get_mut(&request.id) {
            tracked.request = request.clone();
        }
        Ok(())
    }

    /// Write the single audit entry for a terminal request and report it to
    /// the channels when the action is high risk.
    async fn finish(
        &self,
        catalog: &PolicyCatalog,
        issue: &Issue,
        action: &RemediationAction,
        request: &RemediationRequest,
        settled: Settled,
    ) -> RemediationReport {
        let mut details = json!({
            "request_state": request.state,
            "action_severity": action.severity,
        });
        if let Some(attempts) = settled.attempts {
            details["attempts"] = json!(attempts);
        }
        if let Some(state) = settled.circuit_state {
            details["circuit_state"] = json!(state);
        }
        if let Some(error) = &settled.error {
            details["error"] = json!(error);
        }
        if let Some(record) = &settled.approval {
            details["approval"] = json!({
                "decision": record.decision,
                "decided_by": record.decided_by,
                "channels": record.channels,
                "deliveries": record.deliveries,
            });
        }

        self.audit
            .record(
                AuditEntry::new(
                    issue.id.clone(),
                    issue.signature.clone(),
                    settled.outcome,
                    settled.actor.clone(),
                )
                .with_request(request.id)
                .with_action(action.name.clone())
                .with_details(details),
            )
            .await;

        self.report_outcome(
            catalog,
            issue,
            action,
            Some(request.id),
            settled.outcome,
            settled.error.clone(),
        )
        .await;

        RemediationReport {
            request_id: Some(request.id),
            issue_id: issue.id.clone(),
            signature: issue.signature.clone(),
            action: Some(action.name.clone()),
            outcome: settled.outcome,
            allowed: settled.outcome.allowed(),
            attempts: settled.attempts,
            circuit_state: settled.circuit_state,
            approval: settled.approval,
            error: settled.error,
        }
    }

    /// Best-effort outcome notification for high and critical actions.
    async fn report_outcome(
        &self,
        catalog: &PolicyCatalog,
        issue: &Issue,
        action: &RemediationAction,
        request_id: Option<Uuid>,
        outcome: Outcome,
        detail: Option<String>,
    ) {
        if action.severity < Severity::High {
            return;
        }
        let channels = catalog.channels_for(action.severity);
        if channels.is_empty() {
            return;
        }
        let notification = Notification::OutcomeReport {
            request_id,
            action: action.name.clone(),
            action_severity: action.severity,
            issue: issue.clone(),
            outcome,
            detail,
        };
        let results = join_all(
            channels
                .iter()
                .map(|channel| self.notify(channel, &notification)),
        )
        .await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!(action = %action.name, %outcome, failed, "outcome notification not delivered to every channel");
        }
    }

    async fn deliver_approval(
        &self,
        channel: NotificationChannel,
        record: ApprovalRecord,
        action: &RemediationAction,
        issue: &Issue,
    ) -> Result<(), String> {
        let notification = Notification::ApprovalRequested {
            request_id: record.request_id,
            action: action.name.clone(),
            action_severity: action.severity,
            description: action.description.clone(),
            issue: issue.clone(),
            deadline: record.deadline,
        };
        self.notify(&channel, &notification).await
    }

    /// Send one notification through the channel's guard context.
    async fn notify(
        &self,
        channel: &NotificationChannel,
        notification: &Notification,
    ) -> Result<(), String> {
        let Some(notifier) = self.notifiers.get(&channel.name) else {
            self.metrics.increment_notifications_failed();
            return Err(format!("no notifier registered for channel {}", channel.name));
        };
        let notifier: &dyn Notifier = notifier.as_ref();
        self.guard
            .call(&notify_context(&channel.name), move || {
                notifier.notify(channel, notification)
            })
            .await
            .map(|_| ())
            .map_err(|e| {
                self.metrics.increment_notifications_failed();
                if matches!(e, GuardError::CircuitOpen { .. }) {
                    self.metrics.increment_circuit_open();
                }
                e.to_string()
            })
    }

    /// Report what [`handle_issue`](Self::handle_issue) would do now, without
    /// touching dedup, rate limits, approvals, or audit.
    pub fn evaluate(&self, issue: &Issue) -> Evaluation {
        let catalog = self.catalog();
        let matched = catalog.match_actions(issue);
        let selected = matched.first();
        let now = Instant::now();

        Evaluation {
            issue_id: issue.id.clone(),
            signature: issue.signature.clone(),
            matched: matched.iter().map(|a| a.name.clone()).collect(),
            selected: selected.map(|a| a.name.clone()),
            dedup_admits: selected
                .is_some_and(|a| self.dedup.would_admit(&issue.signature, &a.name, now)),
            rate_limit_admits: selected.is_some_and(|a| self.rate_limiter.peek_action(&a.name, now)),
            requires_approval: selected.is_some_and(|a| a.requires_approval),
            approval_channels: selected
                .filter(|a| a.requires_approval)
                .map(|a| {
                    catalog
                        .channels_for(a.severity)
                        .into_iter()
                        .map(|c| c.name)
                        .collect()
                })
                .unwrap_or_default(),
            executor_registered: selected.is_some_and(|a| self.executors.get(&a.name).is_some()),
            circuit_state: selected.map(|a| self.guard.state(&action_context(&a.name))),
        }
    }

    /// Approve or reject a pending request.
    pub fn decide_approval(
        &self,
        request_id: Uuid,
        approve: bool,
        actor: &str,
    ) -> Result<ApprovalRecord, EngineError> {
        let decision = if approve {
            ApprovalDecision::Approved
        } else {
            ApprovalDecision::Rejected
        };
        self.approvals.decide(request_id, decision, actor)
    }

    /// Cancel every pending approval for a signature. Executing actions are
    /// not touched. Returns the number of approvals cancelled.
    #[instrument(skip(self))]
    pub fn resolve_issue(&self, signature: &str, actor: &str) -> usize {
        let cancelled = self
            .approvals
            .pending_for_signature(signature)
            .into_iter()
            .filter_map(|id| self.approvals.cancel(id, actor))
            .filter(|record| record.decision == ApprovalDecision::Cancelled)
            .count();
        info!(cancelled, "issue resolved");
        cancelled
    }

    /// Undo a succeeded remediation through its executor.
    ///
    /// Only `Succeeded` requests qualify, and only until one rollback has
    /// succeeded. The request's own state is left unchanged.
    #[instrument(skip(self))]
    pub async fn rollback(
        &self,
        request_id: Uuid,
        actor: &str,
    ) -> Result<RemediationReport, EngineError> {
        let (request, issue, action, previous) = {
            let mut tracked = self
                .requests
                .get_mut(&request_id)
                .ok_or(EngineError::RequestNotFound(request_id))?;
            if tracked.request.state != RequestState::Succeeded {
                return Err(EngineError::RollbackNotAllowed(format!(
                    "request {request_id} is {}",
                    tracked.request.state
                )));
            }
            if tracked.request.rolled_back_at.is_some() || tracked.rolling_back {
                return Err(EngineError::RollbackNotAllowed(format!(
                    "request {request_id} is already rolled back"
                )));
            }
            tracked.rolling_back = true;
            (
                tracked.request.clone(),
                Arc::clone(&tracked.issue),
                tracked.action.clone(),
                tracked.execution.clone().unwrap_or_default(),
            )
        };

        let context = action_context(&action.name);
        let result = match self.executors.get(&action.name) {
            Some(executor) => {
                let executor: &dyn Executor = executor.as_ref();
                let (action_ref, issue_ref, previous_ref) = (&action, issue.as_ref(), &previous);
                self.guard
                    .call(&context, move || {
                        executor.rollback(action_ref, issue_ref, previous_ref)
                    })
                    .await
                    .map(|done| done.attempts)
                    .map_err(|e| (e.attempts(), e.to_string()))
            }
            None => Err((0, format!("no executor registered for {}", action.name))),
        };

        let rolled_back_at = result.is_ok().then(Utc::now);
        if let Some(mut tracked) = self.requests.get_mut(&request_id) {
            tracked.rolling_back = false;
            tracked.request.rolled_back_at = rolled_back_at;
        }

        let (outcome, attempts, error) = match result {
            Ok(attempts) => {
                info!(action = %action.name, attempts, "remediation rolled back");
                self.metrics.increment_rolled_back();
                (Outcome::RolledBack, attempts, None)
            }
            Err((attempts, error)) => {
                warn!(action = %action.name, attempts, error = %error, "rollback failed");
                self.metrics.increment_rollback_failed();
                (Outcome::RollbackFailed, attempts, Some(error))
            }
        };
        let circuit_state = self.guard.state(&context);

        let mut details = json!({
            "attempts": attempts,
            "circuit_state": circuit_state,
        });
        if let Some(error) = &error {
            details["error"] = json!(error);
        }
        self.audit
            .record(
                AuditEntry::new(issue.id.clone(), issue.signature.clone(), outcome, actor)
                    .with_request(request.id)
                    .with_action(action.name.clone())
                    .with_details(details),
            )
            .await;

        let catalog = self.catalog();
        self.report_outcome(
            &catalog,
            &issue,
            &action,
            Some(request.id),
            outcome,
            error.clone(),
        )
        .await;

        Ok(RemediationReport {
            request_id: Some(request.id),
            issue_id: issue.id.clone(),
            signature: issue.signature.clone(),
            action: Some(action.name.clone()),
            outcome,
            allowed: outcome.allowed(),
            attempts: Some(attempts),
            circuit_state: Some(circuit_state),
            approval: None,
            error,
        })
    }

    /// Close one circuit. Returns `false` for an unknown context.
    pub fn reset_circuit_breaker(&self, context: &str) -> bool {
        self.guard.reset(context)
    }

    pub fn reset_all_circuit_breakers(&self) {
        self.guard.reset_all();
    }

    pub fn circuit_breakers(&self) -> Vec<CircuitSnapshot> {
        self.guard.snapshots()
    }

    /// Swap in a new catalog, along with its per-action rate limits and
    /// default approval timeout. Requests already in flight keep the catalog
    /// they started with.
    pub fn reload_catalog(&self, catalog: PolicyCatalog) {
        let actions = catalog.actions().len();
        let channels = catalog.channels().len();

        let approval_timeout = catalog.approval_timeout();
        if approval_timeout != self.approvals.default_timeout() {
            info!(
                from_secs = self.approvals.default_timeout().as_secs(),
                to_secs = approval_timeout.as_secs(),
                "default approval timeout changed"
            );
            self.approvals.set_default_timeout(approval_timeout);
        }
        let buckets_changed = self.rate_limiter.set_action_capacities(
            catalog
                .actions()
                .iter()
                .filter_map(|a| a.rate_limit.map(|capacity| (a.name.as_str(), capacity))),
        );

        *self.catalog.write() = Arc::new(catalog);
        info!(actions, channels, buckets_changed, "policy catalog reloaded");
    }

    pub fn catalog(&self) -> Arc<PolicyCatalog> {
        Arc::clone(&self.catalog.read())
    }

    pub fn request(&self, request_id: Uuid) -> Option<RemediationRequest> {
        self.requests.get(&request_id).map(|t| t.request.clone())
    }

    /// Tracked requests, oldest first.
    pub fn requests(&self) -> Vec<RemediationRequest> {
        let mut requests: Vec<RemediationRequest> =
            self.requests.iter().map(|t| t.request.clone()).collect();
        requests.sort_by_key(|r| r.created_at);
        requests
    }

    pub fn approval(&self, request_id: Uuid) -> Option<ApprovalRecord> {
        self.approvals.get(request_id)
    }

    pub fn pending_approvals(&self) -> Vec<ApprovalRecord> {
        self.approvals.pending()
    }

    pub async fn query_audit(&self, query: &AuditQuery) -> Result<AuditPage, EngineError> {
        self.audit.query(query).await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Evict expired dedup entries, time out overdue approvals, and drop
    /// settled approvals and terminal requests older than `retention`.
    pub fn sweep(&self, retention: Duration) -> SweepReport {
        let dedup_evicted = self.dedup.sweep(Instant::now());
        let approvals_purged = self.approvals.purge_decided(retention);
        // After the purge, so a waiter still finds the record it wakes up for.
        let approvals_expired = self.approvals.expire_overdue();

        let cutoff = Utc::now()
            .checked_sub_signed(TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX))
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        let before = self.requests.len();
        self.requests.retain(|_, tracked| {
            tracked.rolling_back
                || !tracked.request.is_terminal()
                || tracked.request.updated_at > cutoff
        });
        let requests_purged = before.saturating_sub(self.requests.len());

        let report = SweepReport {
            dedup_evicted,
            approvals_expired,
            approvals_purged,
            requests_purged,
        };
        debug!(?report, "maintenance sweep finished");
        report
    }
}
