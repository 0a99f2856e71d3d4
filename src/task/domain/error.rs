//! Error types for task domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The ticket identifier is empty after trimming.
    #[error("ticket identifier must not be empty")]
    EmptyTicketId,

    /// The ticket identifier contains whitespace.
    #[error("invalid ticket identifier '{0}', whitespace is not allowed")]
    InvalidTicketId(String),

    /// The compliance score is outside `0..=100`.
    #[error("invalid compliance score {0}, expected a value between 0 and 100")]
    InvalidComplianceScore(i64),
}

/// Error returned while parsing task or stage statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} status: {value}")]
pub struct ParseStatusError {
    /// Which status family was being parsed.
    pub kind: &'static str,
    /// The rejected raw value.
    pub value: String,
}
