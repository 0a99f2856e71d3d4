//! Diesel row models for task record persistence.

use super::schema::task_processing;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row for task records.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = task_processing)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// External ticket key.
    pub ticket_id: String,
    /// Overall task status.
    pub task_status: String,
    /// Compliance stage status.
    pub stage1_status: String,
    /// Generation stage status.
    pub stage2_status: String,
    /// Compliance stage error text.
    pub stage1_error: Option<String>,
    /// Generation stage error text.
    pub stage2_error: Option<String>,
    /// Compliance score.
    pub compliance_score: Option<i16>,
    /// Number of re-entries after a return.
    pub return_count: i32,
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
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Update model written on conflict. `None` fields are stored as `NULL`.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = task_processing)]
#[diesel(treat_none_as_null = true)]
pub struct TaskChangeset {
    /// Overall task status.
    pub task_status: String,
    /// Compliance stage status.
    pub stage1_status: String,
    /// Generation stage status.
    pub stage2_status: String,
    /// Compliance stage error text.
    pub stage1_error: Option<String>,
    /// Generation stage error text.
    pub stage2_error: Option<String>,
    /// Compliance score.
    pub compliance_score: Option<i16>,
    /// Number of re-entries after a return.
    pub return_count: i32,
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
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<&TaskRow> for TaskChangeset {
    fn from(row: &TaskRow) -> Self {
        Self {
            task_status: row.task_status.clone(),
            stage1_status: row.stage1_status.clone(),
            stage2_status: row.stage2_status.clone(),
            stage1_error: row.stage1_error.clone(),
            stage2_error: row.stage2_error.clone(),
            compliance_score: row.compliance_score,
            return_count: row.return_count,
            last_external_status: row.last_external_status.clone(),
            skip_detected: row.skip_detected,
            blocked_at: row.blocked_at,
            blocked_retry_at: row.blocked_retry_at,
            block_reason: row.block_reason.clone(),
            error_message: row.error_message.clone(),
            last_processed_at: row.last_processed_at,
            updated_at: row.updated_at,
        }
    }
}
