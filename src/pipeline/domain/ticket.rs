//! Read models returned by the issue tracker.

use chrono::{DateTime, Utc};

/// One ticket comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketComment {
    /// Comment author display name.
    pub author: String,
    /// Plain-text body.
    pub body: String,
    /// When the comment was posted.
    pub created_at: DateTime<Utc>,
}

/// Ticket fields the pipeline inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketSnapshot {
    /// Ticket key.
    pub key: String,
    /// Ticket title.
    pub summary: String,
    /// Current external status.
    pub status: String,
    /// Comments in tracker order.
    pub comments: Vec<TicketComment>,
}

/// One entry of a ticket's status-change history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    /// Status before the change.
    pub from: String,
    /// Status after the change.
    pub to: String,
    /// When the change happened.
    pub at: DateTime<Utc>,
}

/// Result of asking the tracker to move a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    /// Whether the tracker applied the transition.
    pub accepted: bool,
    /// Tracker message, useful when the transition was refused.
    pub message: String,
}

impl StatusChange {
    /// Builds an accepted change.
    #[must_use]
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            message: message.into(),
        }
    }

    /// Builds a refused change.
    #[must_use]
    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
        }
    }
}
