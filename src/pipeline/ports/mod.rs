//! Collaborator ports consumed by the pipeline.

pub mod analysis;
pub mod notifier;
pub mod tracker;

pub use analysis::{
    AnalysisError, AnalysisResult, CaseGenerator, ComplianceAnalyzer, ComplianceReport,
    GeneratedCases,
};
pub use notifier::{NotifyError, NotifyResult, Notifier};
pub use tracker::{IssueTracker, TrackerError, TrackerResult};
