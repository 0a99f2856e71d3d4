//! Store port for per-ticket task records.

use crate::task::domain::{TaskPatch, TaskRecord, TicketId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for task store operations.
pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

/// Durable task record persistence contract.
///
/// Every write is an upsert: the record is created with default values when
/// it does not exist, then the patch is applied atomically with respect to
/// other writers on the same ticket.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Loads the record for a ticket.
    ///
    /// Returns `None` when no record exists.
    async fn get(&self, ticket_id: &TicketId) -> TaskStoreResult<Option<TaskRecord>>;

    /// Creates or updates the record for a ticket and returns the result.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Persistence`] when the backend fails.
    async fn upsert(
        &self,
        ticket_id: &TicketId,
        patch: TaskPatch,
        now: DateTime<Utc>,
    ) -> TaskStoreResult<TaskRecord>;

    /// Removes the record for a ticket.
    ///
    /// Returns `true` when a record was removed.
    async fn delete(&self, ticket_id: &TicketId) -> TaskStoreResult<bool>;

    /// Returns blocked records whose retry time is at or before `now`,
    /// earliest retry first.
    async fn list_blocked_ready_for_retry(
        &self,
        now: DateTime<Utc>,
    ) -> TaskStoreResult<Vec<TaskRecord>>;
}

/// Errors returned by task store implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskStoreError {
    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
