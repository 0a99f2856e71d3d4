//! Inbound status events and ingestion decisions.

use crate::task::domain::{TaskStatus, TicketId};

/// A ticket moved to a new external status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    /// Ticket key.
    pub ticket_id: TicketId,
    /// New external status.
    pub new_status: String,
}

impl StatusEvent {
    /// Creates an event.
    #[must_use]
    pub fn new(ticket_id: TicketId, new_status: impl Into<String>) -> Self {
        Self {
            ticket_id,
            new_status: new_status.into(),
        }
    }
}

/// Why ingestion did not dispatch a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The status is not a configured trigger.
    NotTrigger,
    /// Same status as last time while the task is running or finished.
    Duplicate {
        /// Task status at the time of the event.
        task_status: TaskStatus,
    },
    /// A run for this ticket is already in flight.
    AlreadyRunning,
}
