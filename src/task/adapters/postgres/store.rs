//! `PostgreSQL` store implementation for task records.

use super::{
    models::{TaskChangeset, TaskRow},
    schema::task_processing,
};
use crate::task::{
    domain::{
        ComplianceScore, PersistedTaskData, Stage, StageStatus, TaskPatch, TaskRecord,
        TaskStatus, TicketId,
    },
    ports::{TaskStore, TaskStoreError, TaskStoreResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::Error as DieselError;

/// `PostgreSQL` connection pool type used by the task store.
pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed task store.
///
/// Upserts take a transaction-scoped advisory lock keyed on the ticket, so
/// two writers racing to create the same record serialise instead of one
/// losing its patch.
#[derive(Debug, Clone)]
pub struct PostgresTaskStore {
    pool: TaskPgPool,
}

impl PostgresTaskStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: TaskPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskStoreError::persistence)?
    }
}

impl From<DieselError> for TaskStoreError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

#[async_trait]
impl TaskStore for PostgresTaskStore {
    async fn get(&self, ticket_id: &TicketId) -> TaskStoreResult<Option<TaskRecord>> {
        let key = ticket_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = task_processing::table
                .filter(task_processing::ticket_id.eq(key))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()?;
            row.map(row_to_record).transpose()
        })
        .await
    }

    async fn upsert(
        &self,
        ticket_id: &TicketId,
        patch: TaskPatch,
        now: DateTime<Utc>,
    ) -> TaskStoreResult<TaskRecord> {
        let key = ticket_id.clone();
        self.run_blocking(move |connection| {
            connection.transaction::<_, TaskStoreError, _>(|tx| {
                diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1))")
                    .bind::<diesel::sql_types::Text, _>(key.as_str())
                    .execute(tx)?;

                let existing = task_processing::table
                    .filter(task_processing::ticket_id.eq(key.as_str()))
                    .select(TaskRow::as_select())
                    .for_update()
                    .first::<TaskRow>(tx)
                    .optional()?;

                let mut record = existing
                    .map(row_to_record)
                    .transpose()?
                    .unwrap_or_else(|| TaskRecord::new(key.clone(), now));
                record.apply(patch, now);

                let row = record_to_row(&record);
                diesel::insert_into(task_processing::table)
                    .values(&row)
                    .on_conflict(task_processing::ticket_id)
                    .do_update()
                    .set(&TaskChangeset::from(&row))
                    .execute(tx)?;
                Ok(record)
            })
        })
        .await
    }

    async fn delete(&self, ticket_id: &TicketId) -> TaskStoreResult<bool> {
        let key = ticket_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let removed = diesel::delete(
                task_processing::table.filter(task_processing::ticket_id.eq(key)),
            )
            .execute(connection)?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list_blocked_ready_for_retry(
        &self,
        now: DateTime<Utc>,
    ) -> TaskStoreResult<Vec<TaskRecord>> {
        self.run_blocking(move |connection| {
            let rows = task_processing::table
                .filter(task_processing::task_status.eq(TaskStatus::Blocked.as_str()))
                .filter(task_processing::blocked_retry_at.le(now))
                .order(task_processing::blocked_retry_at.asc())
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)?;
            rows.into_iter().map(row_to_record).collect()
        })
        .await
    }
}

pub(super) fn record_to_row(record: &TaskRecord) -> TaskRow {
    TaskRow {
        ticket_id: record.ticket_id().as_str().to_owned(),
        task_status: record.task_status().as_str().to_owned(),
        stage1_status: record.stage_status(Stage::Compliance).as_str().to_owned(),
        stage2_status: record.stage_status(Stage::Generation).as_str().to_owned(),
        stage1_error: record.stage_error(Stage::Compliance).map(str::to_owned),
        stage2_error: record.stage_error(Stage::Generation).map(str::to_owned),
        compliance_score: record.compliance_score().map(|score| i16::from(score.value())),
        return_count: i32::try_from(record.return_count()).unwrap_or(i32::MAX),
        last_external_status: record.last_external_status().map(str::to_owned),
        skip_detected: record.skip_detected(),
        blocked_at: record.blocked_at(),
        blocked_retry_at: record.blocked_retry_at(),
        block_reason: record.block_reason().map(str::to_owned),
        error_message: record.error_message().map(str::to_owned),
        last_processed_at: record.last_processed_at(),
        created_at: record.created_at(),
        updated_at: record.updated_at(),
    }
}

pub(super) fn row_to_record(row: TaskRow) -> TaskStoreResult<TaskRecord> {
    let TaskRow {
        ticket_id,
        task_status,
        stage1_status,
        stage2_status,
        stage1_error,
        stage2_error,
        compliance_score,
        return_count,
        last_external_status,
        skip_detected,
        blocked_at,
        blocked_retry_at,
        block_reason,
        error_message,
        last_processed_at,
        created_at,
        updated_at,
    } = row;

    let data = PersistedTaskData {
        ticket_id: TicketId::new(ticket_id).map_err(TaskStoreError::persistence)?,
        task_status: task_status
            .parse::<TaskStatus>()
            .map_err(TaskStoreError::persistence)?,
        stage1_status: stage1_status
            .parse::<StageStatus>()
            .map_err(TaskStoreError::persistence)?,
        stage2_status: stage2_status
            .parse::<StageStatus>()
            .map_err(TaskStoreError::persistence)?,
        stage1_error,
        stage2_error,
        compliance_score: compliance_score
            .map(|score| ComplianceScore::new(i64::from(score)))
            .transpose()
            .map_err(TaskStoreError::persistence)?,
        return_count: u32::try_from(return_count).map_err(TaskStoreError::persistence)?,
        last_external_status,
        skip_detected,
        blocked_at,
        blocked_retry_at,
        block_reason,
        error_message,
        last_processed_at,
        created_at,
        updated_at,
    };
    Ok(TaskRecord::from_persisted(data))
}
