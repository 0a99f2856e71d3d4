//! Skip-code and recheck detection.
//!
//! Both checks are advisory: tracker failures are logged and read as
//! "not detected" so they never hold up the compliance stage.

use crate::pipeline::ports::IssueTracker;
use crate::task::domain::TicketId;
use tracing::warn;

/// Returns `true` when one of the newest `max_comments` comments contains
/// `skip_code`, ignoring case.
///
/// An empty code or a zero scan window disables detection.
pub async fn detect_skip(
    tracker: &dyn IssueTracker,
    ticket_id: &TicketId,
    skip_code: &str,
    max_comments: usize,
) -> bool {
    let needle = skip_code.trim().to_lowercase();
    if needle.is_empty() || max_comments == 0 {
        return false;
    }
    let ticket = match tracker.get_ticket(ticket_id).await {
        Ok(ticket) => ticket,
        Err(error) => {
            warn!(ticket = %ticket_id, %error, "skip detection failed, continuing without skip");
            return false;
        }
    };

    let mut comments = ticket.comments;
    comments.sort_by(|left, right| right.created_at.cmp(&left.created_at));
    comments
        .iter()
        .take(max_comments)
        .any(|comment| comment.body.to_lowercase().contains(&needle))
}

/// Returns `true` when the most recent status transition left
/// `returned_status`, ignoring case.
///
/// Only the newest transition is consulted.
pub async fn detect_recheck(
    tracker: &dyn IssueTracker,
    ticket_id: &TicketId,
    returned_status: &str,
) -> bool {
    let history = match tracker.status_history(ticket_id).await {
        Ok(history) => history,
        Err(error) => {
            warn!(ticket = %ticket_id, %error, "recheck detection failed, treating as first check");
            return false;
        }
    };
    history
        .iter()
        .max_by_key(|transition| transition.at)
        .is_some_and(|latest| latest.from.trim().eq_ignore_ascii_case(returned_status.trim()))
}
