//! Notification port.

use crate::pipeline::domain::Notice;
use crate::task::domain::TicketId;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for notifier operations.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Delivers pipeline outcomes to humans.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one notice for a ticket.
    async fn notify(&self, ticket_id: &TicketId, notice: &Notice) -> NotifyResult<()>;
}

/// Errors returned by notifiers.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    /// The notice could not be rendered.
    #[error("failed to render {kind} notice: {message}")]
    Render {
        /// Notice kind.
        kind: &'static str,
        /// Renderer message.
        message: String,
    },
    /// The delivery channel refused the notice.
    #[error("notice was rejected by the delivery channel")]
    Rejected,
    /// The delivery channel failed.
    #[error("notice delivery failed: {0}")]
    Delivery(Arc<dyn std::error::Error + Send + Sync>),
}

impl NotifyError {
    /// Wraps a delivery error.
    pub fn delivery(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Delivery(Arc::new(err))
    }
}
