//! In-memory task store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::task::{
    domain::{TaskPatch, TaskRecord, TicketId},
    ports::{TaskStore, TaskStoreError, TaskStoreResult},
};

/// Thread-safe in-memory task store.
///
/// The write lock spans the whole read-modify-write of an upsert, which
/// gives the same per-ticket atomicity the database adapter gets from its
/// transaction.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    records: Arc<RwLock<HashMap<TicketId, TaskRecord>>>,
}

impl InMemoryTaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Persistence`] when the lock is poisoned.
    pub fn len(&self) -> TaskStoreResult<usize> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.len())
    }

    /// Returns `true` when the store holds no records.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Persistence`] when the lock is poisoned.
    pub fn is_empty(&self) -> TaskStoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

fn poisoned<E: std::fmt::Display>(err: E) -> TaskStoreError {
    TaskStoreError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get(&self, ticket_id: &TicketId) -> TaskStoreResult<Option<TaskRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(ticket_id).cloned())
    }

    async fn upsert(
        &self,
        ticket_id: &TicketId,
        patch: TaskPatch,
        now: DateTime<Utc>,
    ) -> TaskStoreResult<TaskRecord> {
        let mut records = self.records.write().map_err(poisoned)?;
        let record = records
            .entry(ticket_id.clone())
            .or_insert_with(|| TaskRecord::new(ticket_id.clone(), now));
        record.apply(patch, now);
        Ok(record.clone())
    }

    async fn delete(&self, ticket_id: &TicketId) -> TaskStoreResult<bool> {
        let mut records = self.records.write().map_err(poisoned)?;
        Ok(records.remove(ticket_id).is_some())
    }

    async fn list_blocked_ready_for_retry(
        &self,
        now: DateTime<Utc>,
    ) -> TaskStoreResult<Vec<TaskRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        let mut ready: Vec<TaskRecord> = records
            .values()
            .filter(|record| record.is_ready_for_retry(now))
            .cloned()
            .collect();
        ready.sort_by_key(TaskRecord::blocked_retry_at);
        Ok(ready)
    }
}
