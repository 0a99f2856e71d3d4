//! Task-level and stage-level lifecycle statuses.

use super::ParseStatusError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Overall status of a task record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// No run has been started yet.
    None,
    /// A pipeline run is in flight.
    Progressing,
    /// The pipeline finished for the current external status.
    Completed,
    /// The ticket was sent back because its compliance score was too low.
    Returned,
    /// A permanent failure; only a new external event re-enters the pipeline.
    Error,
    /// A transient failure owned by the retry scheduler.
    Blocked,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Progressing => "progressing",
            Self::Completed => "completed",
            Self::Returned => "returned",
            Self::Error => "error",
            Self::Blocked => "blocked",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "none" => Ok(Self::None),
            "progressing" => Ok(Self::Progressing),
            "completed" => Ok(Self::Completed),
            "returned" => Ok(Self::Returned),
            "error" => Ok(Self::Error),
            "blocked" => Ok(Self::Blocked),
            _ => Err(ParseStatusError {
                kind: "task",
                value: value.to_owned(),
            }),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// The stage has not produced a result yet.
    Pending,
    /// The stage finished successfully.
    Done,
    /// The stage was bypassed on operator request.
    Skip,
    /// The stage failed permanently.
    Error,
    /// The stage failed transiently and waits for a retry.
    Blocked,
}

impl StageStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Skip => "skip",
            Self::Error => "error",
            Self::Blocked => "blocked",
        }
    }

    /// Returns `true` for `done` and `skip`, the states a later stage can
    /// build on.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Done | Self::Skip)
    }
}

impl FromStr for StageStatus {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "done" => Ok(Self::Done),
            "skip" => Ok(Self::Skip),
            "error" => Ok(Self::Error),
            "blocked" => Ok(Self::Blocked),
            _ => Err(ParseStatusError {
                kind: "stage",
                value: value.to_owned(),
            }),
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two pipeline stages, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Stage 1: compliance check producing a score.
    Compliance,
    /// Stage 2: test case generation gated on the compliance outcome.
    Generation,
}

impl Stage {
    /// Returns the stable name used in logs and notifications.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Compliance => "compliance",
            Self::Generation => "generation",
        }
    }

    /// Returns the other stage.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Compliance => Self::Generation,
            Self::Generation => Self::Compliance,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
