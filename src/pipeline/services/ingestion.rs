//! Status-event ingestion with duplicate suppression.

use super::{Orchestrator, PipelineError, PipelineResult};
use crate::pipeline::domain::{IgnoreReason, RunPlan, RunReport, StatusEvent};
use crate::task::{
    domain::{TaskStatus, TicketId},
    ports::TaskStore,
};
use mockable::Clock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// External status recorded for operator-triggered runs.
pub const MANUAL_TRIGGER_STATUS: &str = "Manual Check";

/// Handle to a dispatched pipeline run.
///
/// Dropping the handle detaches the run; it keeps going in the background.
#[derive(Debug)]
pub struct PipelineHandle {
    ticket_id: TicketId,
    join: JoinHandle<PipelineResult<RunReport>>,
}

impl PipelineHandle {
    /// Returns the ticket of the run.
    #[must_use]
    pub const fn ticket_id(&self) -> &TicketId {
        &self.ticket_id
    }

    /// Waits for the run to finish.
    ///
    /// # Errors
    ///
    /// Returns the run's own error, or [`PipelineError::Aborted`] when the
    /// run panicked.
    pub async fn wait(self) -> PipelineResult<RunReport> {
        let Self { ticket_id, join } = self;
        join.await.map_err(|err| PipelineError::Aborted {
            ticket_id,
            message: err.to_string(),
        })?
    }
}

/// What ingestion did with an event.
#[derive(Debug)]
pub enum IngestOutcome {
    /// No run was started.
    Ignored(IgnoreReason),
    /// A run was started in the background.
    Dispatched(PipelineHandle),
}

/// Entry point for inbound status events and operator actions.
pub struct IngestionService<S, C>
where
    S: TaskStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    orchestrator: Arc<Orchestrator<S, C>>,
    admission: Mutex<()>,
}

impl<S, C> IngestionService<S, C>
where
    S: TaskStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates an ingestion service over a shared orchestrator.
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator<S, C>>) -> Self {
        Self {
            orchestrator,
            admission: Mutex::new(()),
        }
    }

    /// Handles a status event and returns immediately; the run, if any,
    /// continues in the background.
    ///
    /// Admission decisions are serialised, so two identical events racing
    /// each other still dispatch a single run.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`] when the task store fails.
    pub async fn handle(&self, event: StatusEvent) -> PipelineResult<IngestOutcome> {
        let StatusEvent {
            ticket_id,
            new_status,
        } = event;
        let status = new_status.trim();
        if !self.orchestrator.config().is_trigger(status) {
            debug!(ticket = %ticket_id, status, "status is not a trigger");
            return Ok(IngestOutcome::Ignored(IgnoreReason::NotTrigger));
        }

        let _admission = self.admission.lock().await;
        let ledger = self.orchestrator.ledger();
        if let Some(record) = ledger.get(&ticket_id).await? {
            let task_status = record.task_status();
            let same_status = record.last_external_status() == Some(status);
            match task_status {
                TaskStatus::Progressing | TaskStatus::Completed if same_status => {
                    info!(ticket = %ticket_id, status, %task_status, "duplicate event ignored");
                    return Ok(IngestOutcome::Ignored(IgnoreReason::Duplicate { task_status }));
                }
                TaskStatus::Progressing => {
                    info!(ticket = %ticket_id, status, "run already in flight, event ignored");
                    return Ok(IngestOutcome::Ignored(IgnoreReason::AlreadyRunning));
                }
                TaskStatus::Returned => {
                    let updated = ledger.increment_return_count(&ticket_id).await?;
                    info!(ticket = %ticket_id, return_count = updated.return_count(), "returned ticket re-entered");
                    ledger.reset_stages(&ticket_id).await?;
                }
                TaskStatus::Completed | TaskStatus::Error | TaskStatus::Blocked => {
                    ledger.reset_stages(&ticket_id).await?;
                }
                TaskStatus::None => {}
            }
        }
        ledger.mark_progressing(&ticket_id, status).await?;
        let plan = self.orchestrator.plan_for(status);
        Ok(IngestOutcome::Dispatched(self.dispatch(ticket_id, plan)))
    }

    /// Starts a run regardless of dedup state, with both stages planned.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`] when the task store fails.
    pub async fn trigger_manual(&self, ticket_id: TicketId) -> PipelineResult<PipelineHandle> {
        let _admission = self.admission.lock().await;
        let ledger = self.orchestrator.ledger();
        ledger.reset_stages(&ticket_id).await?;
        ledger
            .mark_progressing(&ticket_id, MANUAL_TRIGGER_STATUS)
            .await?;
        info!(ticket = %ticket_id, "manual run requested");
        Ok(self.dispatch(ticket_id, RunPlan::both_stages()))
    }

    /// Deletes the task record so the next event starts from scratch.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`] when the task store fails.
    pub async fn forget(&self, ticket_id: &TicketId) -> PipelineResult<bool> {
        let _admission = self.admission.lock().await;
        let removed = self.orchestrator.ledger().delete(ticket_id).await?;
        info!(ticket = %ticket_id, removed, "task record deleted");
        Ok(removed)
    }

    fn dispatch(&self, ticket_id: TicketId, plan: RunPlan) -> PipelineHandle {
        let orchestrator = Arc::clone(&self.orchestrator);
        let run_for = ticket_id.clone();
        let join = tokio::spawn(async move {
            let worker = Arc::clone(&orchestrator);
            let inner_id = run_for.clone();
            let run = tokio::spawn(async move { worker.process(&inner_id, plan).await });
            match run.await {
                Ok(result) => result.inspect_err(|err| {
                    error!(ticket = %run_for, error = %err, "pipeline run failed");
                }),
                Err(join_error) => {
                    let message = join_error.to_string();
                    error!(ticket = %run_for, error = %message, "pipeline run panicked");
                    orchestrator
                        .ledger()
                        .mark_error(&run_for, &format!("pipeline run aborted: {message}"))
                        .await?;
                    Err(PipelineError::Aborted {
                        ticket_id: run_for,
                        message,
                    })
                }
            }
        });
        PipelineHandle { ticket_id, join }
    }
}
