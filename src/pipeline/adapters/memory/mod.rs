//! In-memory collaborator adapters for tests and local runs.

mod analysis;
mod notifier;
mod tracker;

pub use analysis::{RecordedCall, ScriptedCaseGenerator, ScriptedComplianceAnalyzer};
pub use notifier::RecordingNotifier;
pub use tracker::InMemoryIssueTracker;
