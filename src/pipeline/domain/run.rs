//! Plans and reports for orchestrated runs.

use super::FailureKind;

/// What one run should attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPlan {
    /// Whether the generation stage is part of this run.
    pub run_generation: bool,
}

impl RunPlan {
    /// Plans both stages.
    #[must_use]
    pub const fn both_stages() -> Self {
        Self {
            run_generation: true,
        }
    }

    /// Plans only the compliance stage.
    #[must_use]
    pub const fn compliance_only() -> Self {
        Self {
            run_generation: false,
        }
    }
}

/// How generation should treat missing compliance context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Normal run with compliance context.
    Full,
    /// Best-effort run without compliance context.
    Degraded,
}

/// Result of one stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage finished and its result was recorded.
    Completed,
    /// Compliance scored below the threshold; the ticket was returned.
    Returned,
    /// A transient failure blocked the stage.
    Blocked,
    /// The stage failed with the given category.
    Failed(FailureKind),
    /// The stage was already `done` or `skip`; nothing ran.
    AlreadySettled,
    /// The record disappeared before the stage ran.
    Missing,
}

/// Result of an orchestrated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReport {
    /// The gate stayed busy for the whole wait; no stage ran.
    QueueTimeout,
    /// The run held the gate.
    Ran {
        /// Compliance outcome, if compliance was attempted.
        compliance: Option<StageOutcome>,
        /// Generation outcome, if generation was attempted.
        generation: Option<StageOutcome>,
    },
}

impl RunReport {
    /// Returns the generation outcome, if any.
    #[must_use]
    pub const fn generation(&self) -> Option<StageOutcome> {
        match self {
            Self::QueueTimeout => None,
            Self::Ran { generation, .. } => *generation,
        }
    }

    /// Returns the compliance outcome, if any.
    #[must_use]
    pub const fn compliance(&self) -> Option<StageOutcome> {
        match self {
            Self::QueueTimeout => None,
            Self::Ran { compliance, .. } => *compliance,
        }
    }
}

/// Result of retrying one blocked task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReport {
    /// The gate was busy; the task stays blocked for the next cycle.
    GateBusy,
    /// The record was deleted or is no longer blocked.
    NotBlocked,
    /// The retry ran.
    Retried(RunReport),
}
