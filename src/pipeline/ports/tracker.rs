//! Issue tracker port.

use crate::pipeline::domain::{StatusChange, StatusTransition, TicketSnapshot};
use crate::task::domain::TicketId;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// External issue tracker client.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Fetches the ticket with its comments.
    async fn get_ticket(&self, ticket_id: &TicketId) -> TrackerResult<TicketSnapshot>;

    /// Posts a comment. Returns `false` when the tracker refused it.
    async fn add_comment(&self, ticket_id: &TicketId, body: &str) -> TrackerResult<bool>;

    /// Moves the ticket to `target_status`.
    async fn change_status(
        &self,
        ticket_id: &TicketId,
        target_status: &str,
    ) -> TrackerResult<StatusChange>;

    /// Returns the ticket's status-change history in any order.
    async fn status_history(&self, ticket_id: &TicketId) -> TrackerResult<Vec<StatusTransition>>;
}

/// Errors returned by tracker implementations.
#[derive(Debug, Clone, Error)]
pub enum TrackerError {
    /// The ticket does not exist in the tracker.
    #[error("ticket not found: {0}")]
    NotFound(TicketId),

    /// Transport or API failure.
    #[error("tracker request failed: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl TrackerError {
    /// Wraps a transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}
