//! Background retry loop for blocked tasks.

use super::{Orchestrator, PipelineResult};
use crate::pipeline::domain::RetryReport;
use crate::task::{domain::TicketId, ports::TaskStore};
use mockable::Clock;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Counts from one scheduler cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Blocked tasks that were due.
    pub due: usize,
    /// Tasks whose blocked stages ran again.
    pub retried: usize,
    /// Tasks left for the next cycle because the gate stayed busy.
    pub deferred: usize,
    /// Tasks that were no longer blocked when their turn came.
    pub skipped: usize,
    /// Retries that hit a store failure or panicked.
    pub failed: usize,
}

/// Periodically re-enters the orchestrator for blocked tasks whose retry
/// time has passed.
///
/// Cancellation is only observed between cycles; a retry in flight always
/// runs to completion.
pub struct RetryScheduler<S, C>
where
    S: TaskStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    orchestrator: Arc<Orchestrator<S, C>>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S, C> RetryScheduler<S, C>
where
    S: TaskStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a stopped scheduler.
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator<S, C>>) -> Self {
        Self {
            orchestrator,
            cancel: CancellationToken::new(),
            worker: Mutex::new(None),
        }
    }

    /// Starts the background loop. Returns `false` when it is already
    /// running or the scheduler was stopped.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() || self.cancel.is_cancelled() {
            return false;
        }
        let scheduler = Arc::clone(self);
        *worker = Some(tokio::spawn(async move { scheduler.run_loop().await }));
        info!(
            interval_secs = self.orchestrator.config().blocked_check_interval().as_secs(),
            "retry scheduler started"
        );
        true
    }

    /// Signals the loop to stop and waits for the current cycle to finish.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = worker {
            if let Err(error) = handle.await {
                error!(%error, "retry scheduler loop ended abnormally");
            }
            info!("retry scheduler stopped");
        }
    }

    /// Returns `true` while the background loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    async fn run_loop(&self) {
        let interval = self.orchestrator.config().blocked_check_interval();
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
            match self.run_cycle().await {
                Ok(report) if report.due > 0 => info!(?report, "retry cycle finished"),
                Ok(_) => debug!("retry cycle found nothing due"),
                Err(error) => error!(%error, "retry cycle failed"),
            }
        }
    }

    /// Runs one scan-and-retry pass.
    ///
    /// Each retry runs in its own task, so a panicking collaborator costs
    /// only that retry; the task is then marked as failed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`](super::PipelineError::Store) when the
    /// blocked-task query fails.
    pub async fn run_cycle(&self) -> PipelineResult<CycleReport> {
        let due = self.orchestrator.ledger().list_blocked_ready_for_retry().await?;
        let mut report = CycleReport {
            due: due.len(),
            ..CycleReport::default()
        };
        for record in due {
            let ticket_id = record.ticket_id().clone();
            let orchestrator = Arc::clone(&self.orchestrator);
            let retry_for = ticket_id.clone();
            let retry = tokio::spawn(async move { orchestrator.retry_blocked(&retry_for).await });
            match retry.await {
                Ok(Ok(RetryReport::Retried(_))) => report.retried += 1,
                Ok(Ok(RetryReport::GateBusy)) => report.deferred += 1,
                Ok(Ok(RetryReport::NotBlocked)) => report.skipped += 1,
                Ok(Err(error)) => {
                    error!(ticket = %ticket_id, %error, "retry failed");
                    report.failed += 1;
                }
                Err(error) => {
                    error!(ticket = %ticket_id, %error, "retry panicked");
                    self.mark_aborted(&ticket_id, &error.to_string()).await;
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn mark_aborted(&self, ticket_id: &TicketId, message: &str) {
        let reason = format!("retry aborted: {message}");
        if let Err(error) = self.orchestrator.ledger().mark_error(ticket_id, &reason).await {
            error!(ticket = %ticket_id, %error, "could not record aborted retry");
        }
    }
}
