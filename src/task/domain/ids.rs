//! Identifier and validated scalar types for the task domain.

use super::TaskDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// External ticket key, the primary key of a task record (for example
/// `DEV-1234`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Creates a validated ticket identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTicketId`] when the trimmed value is
    /// empty and [`TaskDomainError::InvalidTicketId`] when it contains inner
    /// whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        let normalized = raw.trim();
        if normalized.is_empty() {
            return Err(TaskDomainError::EmptyTicketId);
        }
        if normalized.chars().any(char::is_whitespace) {
            return Err(TaskDomainError::InvalidTicketId(raw));
        }
        Ok(Self(normalized.to_owned()))
    }

    /// Returns the identifier as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TicketId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compliance score produced by the first stage, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComplianceScore(u8);

impl ComplianceScore {
    /// Highest representable score.
    pub const MAX: Self = Self(100);

    /// Creates a validated score.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidComplianceScore`] when the value is
    /// negative or above 100.
    pub fn new(value: i64) -> Result<Self, TaskDomainError> {
        u8::try_from(value)
            .ok()
            .filter(|score| *score <= 100)
            .map(Self)
            .ok_or(TaskDomainError::InvalidComplianceScore(value))
    }

    /// Returns the underlying numeric value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Returns `true` when this score is strictly below `threshold`.
    #[must_use]
    pub const fn is_below(self, threshold: Self) -> bool {
        self.0 < threshold.0
    }
}

impl fmt::Display for ComplianceScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
