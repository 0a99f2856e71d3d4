//! Ports for the two AI-backed domain services.

use crate::pipeline::domain::GenerationMode;
use crate::task::domain::{ComplianceScore, TicketId};
use async_trait::async_trait;
use thiserror::Error;

/// Output of a compliance analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceReport {
    /// Score, when the analyzer could produce one.
    pub score: Option<ComplianceScore>,
    /// Human-readable analysis.
    pub analysis: String,
}

/// Output of a generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCases {
    /// Generated test cases.
    pub items: Vec<String>,
}

/// Failure reported by an AI-backed service.
///
/// The message is classified by keyword, so implementations must keep
/// rate-limit and timeout wording from the upstream client intact.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct AnalysisError {
    /// Raw failure text.
    pub message: String,
}

impl AnalysisError {
    /// Creates an error from raw failure text.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result type for AI-backed services.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// First stage: scores a ticket against its linked change.
#[async_trait]
pub trait ComplianceAnalyzer: Send + Sync {
    /// Analyses the ticket.
    async fn analyze(&self, ticket_id: &TicketId) -> AnalysisResult<ComplianceReport>;
}

/// Second stage: generates test cases for a ticket.
#[async_trait]
pub trait CaseGenerator: Send + Sync {
    /// Generates cases in the given mode.
    async fn generate(
        &self,
        ticket_id: &TicketId,
        mode: GenerationMode,
    ) -> AnalysisResult<GeneratedCases>;
}
