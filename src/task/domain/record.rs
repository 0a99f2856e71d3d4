//! Task record aggregate.

use super::{ComplianceScore, Stage, StageStatus, TaskPatch, TaskStatus, TicketId};
use chrono::{DateTime, Utc};

/// Durable per-ticket pipeline state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    ticket_id: TicketId,
    task_status: TaskStatus,
    stage1_status: StageStatus,
    stage2_status: StageStatus,
    stage1_error: Option<String>,
    stage2_error: Option<String>,
    compliance_score: Option<ComplianceScore>,
    return_count: u32,
    last_external_status: Option<String>,
    skip_detected: bool,
    blocked_at: Option<DateTime<Utc>>,
    blocked_retry_at: Option<DateTime<Utc>>,
    block_reason: Option<String>,
    error_message: Option<String>,
    last_processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Ticket key.
    pub ticket_id: TicketId,
    /// Overall status.
    pub task_status: TaskStatus,
    /// Compliance stage status.
    pub stage1_status: StageStatus,
    /// Generation stage status.
    pub stage2_status: StageStatus,
    /// Compliance stage error text.
    pub stage1_error: Option<String>,
    /// Generation stage error text.
    pub stage2_error: Option<String>,
    /// Compliance score, if the first stage produced one.
    pub compliance_score: Option<ComplianceScore>,
    /// Number of times the ticket came back after a return.
    pub return_count: u32,
    /// Last external status seen by ingestion.
    pub last_external_status: Option<String>,
    /// Whether the skip code was found.
    pub skip_detected: bool,
    /// When the current block started.
    pub blocked_at: Option<DateTime<Utc>>,
    /// When the blocked stage becomes eligible for retry.
    pub blocked_retry_at: Option<DateTime<Utc>>,
    /// Why the task is blocked.
    pub block_reason: Option<String>,
    /// Latest task-level error message.
    pub error_message: Option<String>,
    /// When the pipeline last touched the task.
    pub last_processed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Creates a fresh record with both stages pending.
    #[must_use]
    pub const fn new(ticket_id: TicketId, now: DateTime<Utc>) -> Self {
        Self {
            ticket_id,
            task_status: TaskStatus::None,
            stage1_status: StageStatus::Pending,
            stage2_status: StageStatus::Pending,
            stage1_error: None,
            stage2_error: None,
            compliance_score: None,
            return_count: 0,
            last_external_status: None,
            skip_detected: false,
            blocked_at: None,
            blocked_retry_at: None,
            block_reason: None,
            error_message: None,
            last_processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstructs a record from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            ticket_id: data.ticket_id,
            task_status: data.task_status,
            stage1_status: data.stage1_status,
            stage2_status: data.stage2_status,
            stage1_error: data.stage1_error,
            stage2_error: data.stage2_error,
            compliance_score: data.compliance_score,
            return_count: data.return_count,
            last_external_status: data.last_external_status,
            skip_detected: data.skip_detected,
            blocked_at: data.blocked_at,
            blocked_retry_at: data.blocked_retry_at,
            block_reason: data.block_reason,
            error_message: data.error_message,
            last_processed_at: data.last_processed_at,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Applies a partial update and refreshes `updated_at`.
    ///
    /// Block bookkeeping is cleared whenever no stage is left `blocked`, so
    /// `blocked_retry_at` can only survive alongside a blocked stage.
    pub fn apply(&mut self, patch: TaskPatch, now: DateTime<Utc>) {
        let TaskPatch {
            task_status,
            stage1_status,
            stage2_status,
            stage1_error,
            stage2_error,
            compliance_score,
            increment_return_count,
            last_external_status,
            skip_detected,
            blocked_at,
            blocked_retry_at,
            block_reason,
            error_message,
            last_processed_at,
        } = patch;

        assign(&mut self.task_status, task_status);
        assign(&mut self.stage1_status, stage1_status);
        assign(&mut self.stage2_status, stage2_status);
        assign(&mut self.stage1_error, stage1_error);
        assign(&mut self.stage2_error, stage2_error);
        assign(&mut self.compliance_score, compliance_score);
        if increment_return_count {
            self.return_count = self.return_count.saturating_add(1);
        }
        if let Some(status) = last_external_status {
            self.last_external_status = Some(status);
        }
        assign(&mut self.skip_detected, skip_detected);
        assign(&mut self.blocked_at, blocked_at);
        assign(&mut self.blocked_retry_at, blocked_retry_at);
        assign(&mut self.block_reason, block_reason);
        assign(&mut self.error_message, error_message);
        if let Some(at) = last_processed_at {
            self.last_processed_at = Some(at);
        }

        if self.blocked_stages().is_empty() {
            self.blocked_at = None;
            self.blocked_retry_at = None;
            self.block_reason = None;
        }
        self.updated_at = now;
    }

    /// Returns the ticket key.
    #[must_use]
    pub const fn ticket_id(&self) -> &TicketId {
        &self.ticket_id
    }

    /// Returns the overall status.
    #[must_use]
    pub const fn task_status(&self) -> TaskStatus {
        self.task_status
    }

    /// Returns the status of the given stage.
    #[must_use]
    pub const fn stage_status(&self, stage: Stage) -> StageStatus {
        match stage {
            Stage::Compliance => self.stage1_status,
            Stage::Generation => self.stage2_status,
        }
    }

    /// Returns the error text of the given stage.
    #[must_use]
    pub fn stage_error(&self, stage: Stage) -> Option<&str> {
        match stage {
            Stage::Compliance => self.stage1_error.as_deref(),
            Stage::Generation => self.stage2_error.as_deref(),
        }
    }

    /// Returns the compliance score, if any.
    #[must_use]
    pub const fn compliance_score(&self) -> Option<ComplianceScore> {
        self.compliance_score
    }

    /// Returns how many times the ticket re-entered after a return.
    #[must_use]
    pub const fn return_count(&self) -> u32 {
        self.return_count
    }

    /// Returns the last external status seen by ingestion.
    #[must_use]
    pub fn last_external_status(&self) -> Option<&str> {
        self.last_external_status.as_deref()
    }

    /// Returns whether the skip code was detected.
    #[must_use]
    pub const fn skip_detected(&self) -> bool {
        self.skip_detected
    }

    /// Returns when the current block started.
    #[must_use]
    pub const fn blocked_at(&self) -> Option<DateTime<Utc>> {
        self.blocked_at
    }

    /// Returns when the blocked stage becomes eligible for retry.
    #[must_use]
    pub const fn blocked_retry_at(&self) -> Option<DateTime<Utc>> {
        self.blocked_retry_at
    }

    /// Returns the block reason.
    #[must_use]
    pub fn block_reason(&self) -> Option<&str> {
        self.block_reason.as_deref()
    }

    /// Returns the latest task-level error message.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns when the pipeline last touched the task.
    #[must_use]
    pub const fn last_processed_at(&self) -> Option<DateTime<Utc>> {
        self.last_processed_at
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last write timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the stages currently in `blocked`, in pipeline order.
    #[must_use]
    pub fn blocked_stages(&self) -> Vec<Stage> {
        [Stage::Compliance, Stage::Generation]
            .into_iter()
            .filter(|stage| self.stage_status(*stage) == StageStatus::Blocked)
            .collect()
    }

    /// Returns `true` when the blocked task is due for a retry at `now`.
    #[must_use]
    pub fn is_ready_for_retry(&self, now: DateTime<Utc>) -> bool {
        self.task_status == TaskStatus::Blocked
            && self.blocked_retry_at.is_some_and(|retry_at| retry_at <= now)
    }

    /// Decides whether the generation stage may leave `pending`.
    ///
    /// Holds when compliance settled (`done`/`skip`) with no score or a score
    /// at or above `threshold` and the task is neither returned nor blocked,
    /// or when compliance failed while generation is still pending, which
    /// allows a degraded run.
    #[must_use]
    pub fn may_run_generation(&self, threshold: ComplianceScore) -> bool {
        match self.stage1_status {
            StageStatus::Done | StageStatus::Skip => {
                let score_passes = self
                    .compliance_score
                    .is_none_or(|score| !score.is_below(threshold));
                score_passes
                    && !matches!(self.task_status, TaskStatus::Returned | TaskStatus::Blocked)
            }
            StageStatus::Error => self.stage2_status == StageStatus::Pending,
            StageStatus::Pending | StageStatus::Blocked => false,
        }
    }
}

fn assign<T>(field: &mut T, update: Option<T>) {
    if let Some(value) = update {
        *field = value;
    }
}
