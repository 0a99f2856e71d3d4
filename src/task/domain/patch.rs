//! Partial-field update applied atomically by task stores.

use super::{ComplianceScore, Stage, StageStatus, TaskStatus};
use chrono::{DateTime, Utc};

/// A set of field updates for one task record.
///
/// Unset fields are left untouched. Nullable fields use a nested `Option`:
/// `Some(None)` clears the stored value. Stores apply a patch with
/// [`TaskRecord::apply`](super::TaskRecord::apply) inside a single
/// transaction, so concurrent writers never interleave partial updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub(super) task_status: Option<TaskStatus>,
    pub(super) stage1_status: Option<StageStatus>,
    pub(super) stage2_status: Option<StageStatus>,
    pub(super) stage1_error: Option<Option<String>>,
    pub(super) stage2_error: Option<Option<String>>,
    pub(super) compliance_score: Option<Option<ComplianceScore>>,
    pub(super) increment_return_count: bool,
    pub(super) last_external_status: Option<String>,
    pub(super) skip_detected: Option<bool>,
    pub(super) blocked_at: Option<Option<DateTime<Utc>>>,
    pub(super) blocked_retry_at: Option<Option<DateTime<Utc>>>,
    pub(super) block_reason: Option<Option<String>>,
    pub(super) error_message: Option<Option<String>>,
    pub(super) last_processed_at: Option<DateTime<Utc>>,
}

impl TaskPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the patch only refreshes `updated_at`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Sets the overall task status.
    #[must_use]
    pub const fn with_task_status(mut self, status: TaskStatus) -> Self {
        self.task_status = Some(status);
        self
    }

    /// Sets the status of one stage.
    #[must_use]
    pub const fn with_stage_status(mut self, stage: Stage, status: StageStatus) -> Self {
        match stage {
            Stage::Compliance => self.stage1_status = Some(status),
            Stage::Generation => self.stage2_status = Some(status),
        }
        self
    }

    /// Sets or clears the error text of one stage.
    #[must_use]
    pub fn with_stage_error(mut self, stage: Stage, error: Option<String>) -> Self {
        match stage {
            Stage::Compliance => self.stage1_error = Some(error),
            Stage::Generation => self.stage2_error = Some(error),
        }
        self
    }

    /// Sets or clears the compliance score.
    #[must_use]
    pub const fn with_compliance_score(mut self, score: Option<ComplianceScore>) -> Self {
        self.compliance_score = Some(score);
        self
    }

    /// Increments `return_count` by one when applied.
    #[must_use]
    pub const fn incrementing_return_count(mut self) -> Self {
        self.increment_return_count = true;
        self
    }

    /// Records the last external status seen for the ticket.
    #[must_use]
    pub fn with_last_external_status(mut self, status: impl Into<String>) -> Self {
        self.last_external_status = Some(status.into());
        self
    }

    /// Sets the skip-detected flag.
    #[must_use]
    pub const fn with_skip_detected(mut self, detected: bool) -> Self {
        self.skip_detected = Some(detected);
        self
    }

    /// Records a block with its retry time.
    #[must_use]
    pub fn with_block(
        mut self,
        blocked_at: DateTime<Utc>,
        retry_at: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Self {
        self.blocked_at = Some(Some(blocked_at));
        self.blocked_retry_at = Some(Some(retry_at));
        self.block_reason = Some(Some(reason.into()));
        self
    }

    /// Clears `blocked_at`, `blocked_retry_at` and `block_reason`.
    #[must_use]
    pub fn clearing_block(mut self) -> Self {
        self.blocked_at = Some(None);
        self.blocked_retry_at = Some(None);
        self.block_reason = Some(None);
        self
    }

    /// Sets or clears the task-level error message.
    #[must_use]
    pub fn with_error_message(mut self, message: Option<String>) -> Self {
        self.error_message = Some(message);
        self
    }

    /// Records when the pipeline last touched the task.
    #[must_use]
    pub const fn with_last_processed_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_processed_at = Some(at);
        self
    }
}
