//! Pipeline services: stage runners, orchestration, retries and ingestion.

mod detector;
mod ingestion;
mod orchestrator;
mod scheduler;
mod stages;

pub use detector::{detect_recheck, detect_skip};
pub use ingestion::{IngestOutcome, IngestionService, MANUAL_TRIGGER_STATUS, PipelineHandle};
pub use orchestrator::Orchestrator;
pub use scheduler::{CycleReport, RetryScheduler};
pub use stages::StageRunner;

use crate::pipeline::ports::{CaseGenerator, ComplianceAnalyzer, IssueTracker, Notifier};
use crate::task::{domain::TicketId, ports::TaskStoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// External collaborators shared by every pipeline service.
#[derive(Clone)]
pub struct Collaborators {
    /// Issue tracker client.
    pub tracker: Arc<dyn IssueTracker>,
    /// First-stage service.
    pub analyzer: Arc<dyn ComplianceAnalyzer>,
    /// Second-stage service.
    pub generator: Arc<dyn CaseGenerator>,
    /// Outcome delivery.
    pub notifier: Arc<dyn Notifier>,
}

/// Service-level pipeline errors.
///
/// Collaborator failures never show up here; they are recorded on the task.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The task store failed; the run stopped without assuming the write.
    #[error(transparent)]
    Store(#[from] TaskStoreError),
    /// A spawned pipeline run panicked or was cancelled.
    #[error("pipeline run for {ticket_id} did not finish: {message}")]
    Aborted {
        /// Ticket of the run.
        ticket_id: TicketId,
        /// Join error text.
        message: String,
    },
    /// A shared gate paces calls differently from the configuration.
    #[error(
        "shared gate paces AI calls every {gate:?} but the configuration asks for {configured:?}"
    )]
    GateMismatch {
        /// Interval of the supplied gate.
        gate: Duration,
        /// Configured `min_ai_call_interval`.
        configured: Duration,
    },
}

/// Result type for pipeline services.
pub type PipelineResult<T> = Result<T, PipelineError>;
