//! In-memory issue tracker.

use crate::pipeline::{
    domain::{StatusChange, StatusTransition, TicketComment, TicketSnapshot},
    ports::{IssueTracker, TrackerError, TrackerResult},
};
use crate::task::domain::TicketId;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone)]
struct TicketEntry {
    snapshot: TicketSnapshot,
    history: Vec<StatusTransition>,
    posted: Vec<String>,
}

#[derive(Debug, Default)]
struct TrackerState {
    tickets: HashMap<TicketId, TicketEntry>,
    refuse_status_changes: bool,
}

/// Thread-safe in-memory issue tracker.
///
/// Status changes made through the port are appended to the ticket history,
/// stamped one second after its newest entry.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIssueTracker {
    state: Arc<RwLock<TrackerState>>,
}

fn poisoned<E: std::fmt::Display>(err: E) -> TrackerError {
    TrackerError::transport(std::io::Error::other(err.to_string()))
}

impl InMemoryIssueTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a ticket with the given status and no comments.
    pub fn insert_ticket(&self, ticket_id: &TicketId, summary: &str, status: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.tickets.insert(
            ticket_id.clone(),
            TicketEntry {
                snapshot: TicketSnapshot {
                    key: ticket_id.to_string(),
                    summary: summary.to_owned(),
                    status: status.to_owned(),
                    comments: Vec::new(),
                },
                history: Vec::new(),
                posted: Vec::new(),
            },
        );
    }

    /// Adds a human comment to a registered ticket.
    pub fn push_comment(&self, ticket_id: &TicketId, author: &str, body: &str, at: DateTime<Utc>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = state.tickets.get_mut(ticket_id) {
            entry.snapshot.comments.push(TicketComment {
                author: author.to_owned(),
                body: body.to_owned(),
                created_at: at,
            });
        }
    }

    /// Records a status transition made outside the pipeline.
    pub fn push_transition(&self, ticket_id: &TicketId, from: &str, to: &str, at: DateTime<Utc>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = state.tickets.get_mut(ticket_id) {
            to.clone_into(&mut entry.snapshot.status);
            entry.history.push(StatusTransition {
                from: from.to_owned(),
                to: to.to_owned(),
                at,
            });
        }
    }

    /// Makes subsequent status changes fail with a refusal.
    pub fn refuse_status_changes(&self, refuse: bool) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.refuse_status_changes = refuse;
    }

    /// Returns comments posted through [`IssueTracker::add_comment`].
    #[must_use]
    pub fn posted_comments(&self, ticket_id: &TicketId) -> Vec<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .tickets
            .get(ticket_id)
            .map(|entry| entry.posted.clone())
            .unwrap_or_default()
    }

    /// Returns the current external status of a ticket.
    #[must_use]
    pub fn status_of(&self, ticket_id: &TicketId) -> Option<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .tickets
            .get(ticket_id)
            .map(|entry| entry.snapshot.status.clone())
    }
}

#[async_trait]
impl IssueTracker for InMemoryIssueTracker {
    async fn get_ticket(&self, ticket_id: &TicketId) -> TrackerResult<TicketSnapshot> {
        let state = self.state.read().map_err(poisoned)?;
        state
            .tickets
            .get(ticket_id)
            .map(|entry| entry.snapshot.clone())
            .ok_or_else(|| TrackerError::NotFound(ticket_id.clone()))
    }

    async fn add_comment(&self, ticket_id: &TicketId, body: &str) -> TrackerResult<bool> {
        let mut state = self.state.write().map_err(poisoned)?;
        let entry = state
            .tickets
            .get_mut(ticket_id)
            .ok_or_else(|| TrackerError::NotFound(ticket_id.clone()))?;
        entry.posted.push(body.to_owned());
        Ok(true)
    }

    async fn change_status(
        &self,
        ticket_id: &TicketId,
        target_status: &str,
    ) -> TrackerResult<StatusChange> {
        let mut state = self.state.write().map_err(poisoned)?;
        if state.refuse_status_changes {
            return Ok(StatusChange::refused("transition not allowed"));
        }
        let entry = state
            .tickets
            .get_mut(ticket_id)
            .ok_or_else(|| TrackerError::NotFound(ticket_id.clone()))?;
        let from = std::mem::replace(&mut entry.snapshot.status, target_status.to_owned());
        let at = entry
            .history
            .iter()
            .map(|transition| transition.at)
            .max()
            .map_or(DateTime::<Utc>::MIN_UTC, |last| last + TimeDelta::seconds(1));
        entry.history.push(StatusTransition {
            from,
            to: target_status.to_owned(),
            at,
        });
        Ok(StatusChange::accepted(format!("moved to {target_status}")))
    }

    async fn status_history(&self, ticket_id: &TicketId) -> TrackerResult<Vec<StatusTransition>> {
        let state = self.state.read().map_err(poisoned)?;
        state
            .tickets
            .get(ticket_id)
            .map(|entry| entry.history.clone())
            .ok_or_else(|| TrackerError::NotFound(ticket_id.clone()))
    }
}
