//! Outcomes the pipeline reports to the notification layer.

use super::FailureKind;
use crate::task::domain::Stage;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A notification-worthy pipeline outcome.
///
/// The pipeline only decides that a notice is due and what it says;
/// rendering and delivery belong to a [`Notifier`](crate::pipeline::ports::Notifier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Compliance finished.
    ComplianceChecked {
        /// Score in `0..=100`, if the analyzer produced one.
        score: Option<u8>,
        /// Analyzer summary.
        analysis: String,
        /// Whether this run re-analyses a previously returned ticket.
        recheck: bool,
    },
    /// Generation finished.
    CasesGenerated {
        /// Number of generated cases.
        count: usize,
        /// Whether generation ran without compliance context.
        degraded: bool,
    },
    /// A stage failed permanently or with a missing dependency.
    StageFailed {
        /// Failed stage.
        stage: Stage,
        /// Failure category.
        category: FailureKind,
        /// Raw failure text.
        message: String,
    },
    /// A stage hit a transient failure and will be retried.
    Blocked {
        /// Blocked stage.
        stage: Stage,
        /// Raw failure text.
        reason: String,
        /// When the retry becomes due.
        retry_at: DateTime<Utc>,
    },
    /// The run could not enter the AI access gate in time.
    QueueTimeout {
        /// Seconds waited before giving up.
        waited_secs: u64,
    },
    /// The ticket was sent back because its score was too low.
    Returned {
        /// Compliance score.
        score: u8,
        /// Configured threshold.
        threshold: u8,
        /// External status used for returned tickets.
        target_status: String,
        /// Whether the tracker accepted the move to `target_status`.
        transitioned: bool,
    },
    /// Compliance was bypassed by the skip code.
    Skipped {
        /// The skip code that matched.
        code: String,
    },
}

impl Notice {
    /// Returns the serialized `kind` tag that selects the notice template.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ComplianceChecked { .. } => "compliance_checked",
            Self::CasesGenerated { .. } => "cases_generated",
            Self::StageFailed { .. } => "stage_failed",
            Self::Blocked { .. } => "blocked",
            Self::QueueTimeout { .. } => "queue_timeout",
            Self::Returned { .. } => "returned",
            Self::Skipped { .. } => "skipped",
        }
    }
}
