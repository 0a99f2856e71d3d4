//! Named state transitions over the task store.
//!
//! Pipeline code never builds patches itself; every lifecycle move goes
//! through one of the methods here so the field combinations stay
//! consistent.

use crate::task::{
    domain::{ComplianceScore, Stage, StageStatus, TaskPatch, TaskRecord, TaskStatus, TicketId},
    ports::{TaskStore, TaskStoreResult},
};
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;

/// Error text recorded on generation when compliance fails for an unknown
/// reason.
pub const CASCADE_ERROR: &str = "blocked by compliance failure";

/// Task record service.
pub struct TaskLedger<S, C>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
}

impl<S, C> Clone for TaskLedger<S, C>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S, C> TaskLedger<S, C>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    /// Creates a ledger over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    /// Returns the current time from the injected clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    /// Loads the record for a ticket.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn get(&self, ticket_id: &TicketId) -> TaskStoreResult<Option<TaskRecord>> {
        self.store.get(ticket_id).await
    }

    async fn write(&self, ticket_id: &TicketId, patch: TaskPatch) -> TaskStoreResult<TaskRecord> {
        self.store.upsert(ticket_id, patch, self.now()).await
    }

    /// Marks a run as started for `external_status`.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn mark_progressing(
        &self,
        ticket_id: &TicketId,
        external_status: &str,
    ) -> TaskStoreResult<TaskRecord> {
        let patch = TaskPatch::new()
            .with_task_status(TaskStatus::Progressing)
            .with_last_external_status(external_status)
            .with_error_message(None)
            .with_last_processed_at(self.now());
        self.write(ticket_id, patch).await
    }

    /// Puts a blocked task back into `progressing` for a retry, keeping the
    /// last external status.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn mark_resumed(&self, ticket_id: &TicketId) -> TaskStoreResult<TaskRecord> {
        let patch = TaskPatch::new()
            .with_task_status(TaskStatus::Progressing)
            .with_last_processed_at(self.now());
        self.write(ticket_id, patch).await
    }

    /// Marks the task completed.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn mark_completed(&self, ticket_id: &TicketId) -> TaskStoreResult<TaskRecord> {
        let patch = TaskPatch::new()
            .with_task_status(TaskStatus::Completed)
            .with_last_processed_at(self.now());
        self.write(ticket_id, patch).await
    }

    /// Marks the ticket as returned for clarification.
    ///
    /// Compliance stays `done` and generation goes back to `pending` so the
    /// next re-entry starts cleanly.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn mark_returned(&self, ticket_id: &TicketId) -> TaskStoreResult<TaskRecord> {
        let patch = TaskPatch::new()
            .with_task_status(TaskStatus::Returned)
            .with_stage_status(Stage::Compliance, StageStatus::Done)
            .with_stage_status(Stage::Generation, StageStatus::Pending)
            .with_stage_error(Stage::Generation, None)
            .with_last_processed_at(self.now());
        self.write(ticket_id, patch).await
    }

    /// Marks the task as permanently failed.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn mark_error(
        &self,
        ticket_id: &TicketId,
        message: &str,
    ) -> TaskStoreResult<TaskRecord> {
        let patch = TaskPatch::new()
            .with_task_status(TaskStatus::Error)
            .with_error_message(Some(message.to_owned()))
            .with_last_processed_at(self.now());
        self.write(ticket_id, patch).await
    }

    /// Blocks `stage` after a transient failure and schedules a retry
    /// `retry_delay` from now.
    ///
    /// Blocking compliance also parks generation in `pending`.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn mark_blocked(
        &self,
        ticket_id: &TicketId,
        stage: Stage,
        reason: &str,
        retry_delay: Duration,
    ) -> TaskStoreResult<TaskRecord> {
        let now = self.now();
        let retry_at = TimeDelta::from_std(retry_delay)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut patch = TaskPatch::new()
            .with_task_status(TaskStatus::Blocked)
            .with_stage_status(stage, StageStatus::Blocked)
            .with_stage_error(stage, Some(reason.to_owned()))
            .with_block(now, retry_at, reason)
            .with_last_processed_at(now);
        if stage == Stage::Compliance {
            patch = patch.with_stage_status(Stage::Generation, StageStatus::Pending);
        }
        self.write(ticket_id, patch).await
    }

    /// Marks `stage` as done. A finished generation completes the task.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn mark_stage_done(
        &self,
        ticket_id: &TicketId,
        stage: Stage,
        score: Option<ComplianceScore>,
    ) -> TaskStoreResult<TaskRecord> {
        let mut patch = TaskPatch::new()
            .with_stage_status(stage, StageStatus::Done)
            .with_stage_error(stage, None)
            .with_last_processed_at(self.now());
        match stage {
            Stage::Compliance => patch = patch.with_compliance_score(score),
            Stage::Generation => patch = patch.with_task_status(TaskStatus::Completed),
        }
        self.write(ticket_id, patch).await
    }

    /// Records a permanent stage failure and moves the task to `error`.
    ///
    /// For a compliance failure, `keep_generation_pending` decides whether
    /// generation stays eligible for a degraded run or inherits the failure.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn mark_stage_failed(
        &self,
        ticket_id: &TicketId,
        stage: Stage,
        message: &str,
        keep_generation_pending: bool,
    ) -> TaskStoreResult<TaskRecord> {
        let mut patch = TaskPatch::new()
            .with_task_status(TaskStatus::Error)
            .with_stage_status(stage, StageStatus::Error)
            .with_stage_error(stage, Some(message.to_owned()))
            .with_error_message(Some(message.to_owned()))
            .with_last_processed_at(self.now());
        if stage == Stage::Compliance {
            patch = if keep_generation_pending {
                patch
                    .with_stage_status(Stage::Generation, StageStatus::Pending)
                    .with_stage_error(Stage::Generation, None)
            } else {
                patch
                    .with_stage_status(Stage::Generation, StageStatus::Error)
                    .with_stage_error(Stage::Generation, Some(CASCADE_ERROR.to_owned()))
            };
        }
        self.write(ticket_id, patch).await
    }

    /// Marks compliance skipped because the ticket carries the skip code.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn mark_compliance_skipped(
        &self,
        ticket_id: &TicketId,
    ) -> TaskStoreResult<TaskRecord> {
        let patch = TaskPatch::new()
            .with_stage_status(Stage::Compliance, StageStatus::Skip)
            .with_stage_error(Stage::Compliance, None)
            .with_compliance_score(None)
            .with_skip_detected(true)
            .with_last_processed_at(self.now());
        self.write(ticket_id, patch).await
    }

    /// Records a gate wait timeout: both stages and the task go to `error`.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn mark_queue_timeout(
        &self,
        ticket_id: &TicketId,
        message: &str,
    ) -> TaskStoreResult<TaskRecord> {
        let patch = TaskPatch::new()
            .with_task_status(TaskStatus::Error)
            .with_stage_status(Stage::Compliance, StageStatus::Error)
            .with_stage_status(Stage::Generation, StageStatus::Error)
            .with_stage_error(Stage::Compliance, Some(message.to_owned()))
            .with_stage_error(Stage::Generation, Some(message.to_owned()))
            .with_error_message(Some(message.to_owned()))
            .with_last_processed_at(self.now());
        self.write(ticket_id, patch).await
    }

    /// Puts one stage back to `pending` with no error.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn reset_stage(
        &self,
        ticket_id: &TicketId,
        stage: Stage,
    ) -> TaskStoreResult<TaskRecord> {
        let patch = TaskPatch::new()
            .with_stage_status(stage, StageStatus::Pending)
            .with_stage_error(stage, None);
        self.write(ticket_id, patch).await
    }

    /// Puts both stages back to `pending` and clears stage results.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn reset_stages(&self, ticket_id: &TicketId) -> TaskStoreResult<TaskRecord> {
        let patch = TaskPatch::new()
            .with_stage_status(Stage::Compliance, StageStatus::Pending)
            .with_stage_status(Stage::Generation, StageStatus::Pending)
            .with_stage_error(Stage::Compliance, None)
            .with_stage_error(Stage::Generation, None)
            .with_compliance_score(None)
            .with_skip_detected(false)
            .with_error_message(None);
        self.write(ticket_id, patch).await
    }

    /// Counts one more return cycle.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn increment_return_count(
        &self,
        ticket_id: &TicketId,
    ) -> TaskStoreResult<TaskRecord> {
        self.write(ticket_id, TaskPatch::new().incrementing_return_count())
            .await
    }

    /// Removes the record for a ticket.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn delete(&self, ticket_id: &TicketId) -> TaskStoreResult<bool> {
        self.store.delete(ticket_id).await
    }

    /// Lists blocked tasks that are due for a retry now.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list_blocked_ready_for_retry(&self) -> TaskStoreResult<Vec<TaskRecord>> {
        self.store.list_blocked_ready_for_retry(self.now()).await
    }
}
