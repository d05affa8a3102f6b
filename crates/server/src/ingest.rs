//! Bounded issue queue between the HTTP API and the orchestrator.
//!
//! `POST /v1/issues` enqueues and returns immediately; a single dispatcher
//! task drains the queue and spawns one handling task per issue, bounded by
//! a semaphore. Handling may suspend for approvals, so callers never wait on
//! the queue. Inline handling (`?wait=true`) runs on the same tracker, so a
//! caller that goes away does not cancel the remediation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use remedy_core::Issue;
use remedy_engine::{RemediationOrchestrator, RemediationReport};
use serde::Serialize;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::IngestConfig;
use crate::error::ServerError;

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    rejected: AtomicU64,
}

/// Queue depth and admission counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IngestStats {
    pub accepted: u64,
    pub rejected: u64,
    pub queued: usize,
    pub capacity: usize,
}

/// Producer handle for the ingest queue.
#[derive(Clone)]
pub struct IngestQueue {
    tx: mpsc::Sender<Issue>,
    counters: Arc<Counters>,
    orchestrator: Arc<RemediationOrchestrator>,
    tracker: TaskTracker,
}

impl IngestQueue {
    /// Enqueue an issue without waiting. Fails when the queue is full or the
    /// dispatcher has stopped.
    pub fn submit(&self, issue: Issue) -> Result<(), ServerError> {
        match self.tx.try_send(issue) {
            Ok(()) => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(issue)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(issue_id = %issue.id, "ingest queue full, rejecting issue");
                Err(ServerError::Unavailable("ingest queue is full".into()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(ServerError::Unavailable("server is shutting down".into()))
            }
        }
    }

    /// Handle an issue on a tracked task and wait for its report. Dropping
    /// the returned future leaves the task running to completion, and
    /// shutdown waits for it like any queued issue.
    pub async fn handle_now(&self, issue: Issue) -> Result<RemediationReport, ServerError> {
        if self.tx.is_closed() {
            return Err(ServerError::Unavailable("server is shutting down".into()));
        }
        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        let orchestrator = Arc::clone(&self.orchestrator);
        let task = self
            .tracker
            .spawn(async move { orchestrator.handle_issue(issue).await });
        match task.await {
            Ok(report) => Ok(report?),
            Err(e) => Err(ServerError::Internal(format!("issue handling task failed: {e}"))),
        }
    }

    pub fn stats(&self) -> IngestStats {
        let capacity = self.tx.max_capacity();
        IngestStats {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            queued: capacity - self.tx.capacity(),
            capacity,
        }
    }
}

/// The running dispatcher. Call [`shutdown`](Self::shutdown) to stop it.
pub struct IngestDispatcher {
    cancel: CancellationToken,
    tracker: TaskTracker,
    handle: JoinHandle<()>,
}

impl IngestDispatcher {
    /// Stop taking new issues, handle what is already queued, and wait for
    /// every in-flight issue to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            error!(error = %e, "ingest dispatcher task failed");
        }
        self.tracker.close();
        self.tracker.wait().await;
        info!("ingest dispatcher stopped");
    }

    /// Number of issues currently being handled.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }
}

/// Create the queue and spawn its dispatcher.
pub fn spawn(
    orchestrator: Arc<RemediationOrchestrator>,
    config: &IngestConfig,
) -> (IngestQueue, IngestDispatcher) {
    let (tx, mut rx) = mpsc::channel::<Issue>(config.queue_capacity.max(1));
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();

    let handle = {
        let cancel = cancel.clone();
        let tracker = tracker.clone();
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            loop {
                let issue = tokio::select! {
                    () = cancel.cancelled() => break,
                    received = rx.recv() => match received {
                        Some(issue) => issue,
                        None => break,
                    },
                };
                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                    break;
                };
                dispatch(&tracker, &orchestrator, issue, permit);
            }

            // Refuse new submissions, then hand off whatever is still buffered.
            rx.close();
            while let Some(issue) = rx.recv().await {
                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                    break;
                };
                dispatch(&tracker, &orchestrator, issue, permit);
            }
        })
    };

    let queue = IngestQueue {
        tx,
        counters: Arc::new(Counters::default()),
        orchestrator,
        tracker: tracker.clone(),
    };
    (
        queue,
        IngestDispatcher {
            cancel,
            tracker,
            handle,
        },
    )
}

fn dispatch(
    tracker: &TaskTracker,
    orchestrator: &Arc<RemediationOrchestrator>,
    issue: Issue,
    permit: tokio::sync::OwnedSemaphorePermit,
) {
    let orchestrator = Arc::clone(orchestrator);
    tracker.spawn(async move {
        let _permit = permit;
        let issue_id = issue.id.clone();
        match orchestrator.handle_issue(issue).await {
            Ok(report) => debug!(
                issue_id = %issue_id,
                outcome = %report.outcome,
                "queued issue handled"
            ),
            Err(e) => error!(issue_id = %issue_id, error = %e, "queued issue failed"),
        }
    });
}

#[cfg(test)]
mod tests {
    use remedy_audit::AuditQuery;
    use remedy_audit_memory::MemoryAuditSink;
    use std::time::Duration;

    use remedy_core::{ActionConfig, Outcome, PolicyConfig, Severity};
    use remedy_engine::OrchestratorBuilder;
    use remedy_provider::LogExecutor;

    use super::*;

    fn orchestrator() -> Arc<RemediationOrchestrator> {
        let policy = PolicyConfig {
            actions: vec![ActionConfig::new(
                "restart_pod",
                Severity::Low,
                ["crash_loop"],
            )],
            ..PolicyConfig::default()
        };
        Arc::new(
            OrchestratorBuilder::new()
                .policy(policy)
                .audit(Arc::new(MemoryAuditSink::new()))
                .fallback_executor(Arc::new(LogExecutor::new("log")))
                .build()
                .unwrap(),
        )
    }

    fn config(queue_capacity: usize) -> IngestConfig {
        IngestConfig {
            queue_capacity,
            max_concurrent: 2,
        }
    }

    #[tokio::test]
    async fn queued_issues_are_handled_before_shutdown_returns() {
        let orchestrator = orchestrator();
        let (queue, dispatcher) = spawn(Arc::clone(&orchestrator), &config(8));

        for n in 0..3 {
            queue
                .submit(Issue::new(format!("svc-{n}/crash"), "crash_loop", Severity::High))
                .unwrap();
        }
        dispatcher.shutdown().await;

        let page = orchestrator
            .query_audit(&AuditQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(queue.stats().accepted, 3);
    }

    #[tokio::test]
    async fn full_queue_rejects() {
        let (tx, _rx) = mpsc::channel(1);
        let queue = IngestQueue {
            tx,
            counters: Arc::new(Counters::default()),
            orchestrator: orchestrator(),
            tracker: TaskTracker::new(),
        };
        queue
            .submit(Issue::new("svc-A/crash", "crash_loop", Severity::High))
            .unwrap();
        let err = queue
            .submit(Issue::new("svc-B/crash", "crash_loop", Severity::High))
            .unwrap_err();
        assert!(matches!(err, ServerError::Unavailable(_)));

        let stats = queue.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.capacity, 1);
    }

    #[tokio::test]
    async fn inline_handling_survives_a_dropped_caller() {
        let policy = PolicyConfig {
            actions: vec![
                ActionConfig::new("rollback_deployment", Severity::High, ["error_rate_spike"])
                    .requires_approval(true),
            ],
            ..PolicyConfig::default()
        };
        let orchestrator = Arc::new(
            OrchestratorBuilder::new()
                .policy(policy)
                .audit(Arc::new(MemoryAuditSink::new()))
                .fallback_executor(Arc::new(LogExecutor::new("log")))
                .build()
                .unwrap(),
        );
        let (queue, dispatcher) = spawn(Arc::clone(&orchestrator), &config(4));

        let inline = queue.handle_now(Issue::new("svc-A/errors", "error_rate_spike", Severity::High));
        assert!(
            tokio::time::timeout(Duration::from_millis(50), inline)
                .await
                .is_err()
        );

        let mut pending = orchestrator.pending_approvals();
        for _ in 0..200 {
            if !pending.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            pending = orchestrator.pending_approvals();
        }
        assert_eq!(pending.len(), 1);
        orchestrator
            .decide_approval(pending[0].request_id, true, "alice")
            .unwrap();

        dispatcher.shutdown().await;
        let page = orchestrator
            .query_audit(&AuditQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.entries[0].outcome, Outcome::Succeeded);
        assert_eq!(queue.stats().accepted, 1);
    }

    #[tokio::test]
    async fn inline_handling_after_shutdown_is_unavailable() {
        let (queue, dispatcher) = spawn(orchestrator(), &config(4));
        dispatcher.shutdown().await;

        let err = queue
            .handle_now(Issue::new("svc-A/crash", "crash_loop", Severity::High))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Unavailable(_)));
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_unavailable() {
        let (queue, dispatcher) = spawn(orchestrator(), &config(4));
        dispatcher.shutdown().await;

        let err = queue
            .submit(Issue::new("svc-A/crash", "crash_loop", Severity::High))
            .unwrap_err();
        assert!(err.to_string().contains("shutting down"));
    }
}
