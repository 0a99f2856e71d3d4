//! Notifier that keeps every notice in memory.

use crate::pipeline::{
    domain::Notice,
    ports::{Notifier, NotifyResult},
};
use crate::task::domain::TicketId;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

/// Records notices instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<(TicketId, Notice)>>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every notice in delivery order.
    #[must_use]
    pub fn notices(&self) -> Vec<(TicketId, Notice)> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the notices delivered for one ticket.
    #[must_use]
    pub fn notices_for(&self, ticket_id: &TicketId) -> Vec<Notice> {
        self.notices()
            .into_iter()
            .filter(|(id, _)| id == ticket_id)
            .map(|(_, notice)| notice)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, ticket_id: &TicketId, notice: &Notice) -> NotifyResult<()> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((ticket_id.clone(), notice.clone()));
        Ok(())
    }
}
