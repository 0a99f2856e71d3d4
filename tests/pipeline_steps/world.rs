//! Shared world state for pipeline BDD scenarios.

use std::sync::Arc;
use std::time::Duration;

use mockable::DefaultClock;
use rstest::fixture;
use stagehand::{
    config::PipelineConfig,
    pipeline::{
        adapters::{
            CommentNotifier,
            memory::{InMemoryIssueTracker, ScriptedCaseGenerator, ScriptedComplianceAnalyzer},
        },
        domain::IgnoreReason,
        services::{Collaborators, IngestionService, Orchestrator},
    },
    task::{adapters::memory::InMemoryTaskStore, domain::TicketId, services::TaskLedger},
};

/// Orchestrator type used by the BDD world.
pub type WorldOrchestrator = Orchestrator<InMemoryTaskStore, DefaultClock>;

/// Minimum spacing between AI calls in scenarios.
pub const MIN_AI_CALL_INTERVAL: Duration = Duration::from_millis(50);

/// Scenario world for pipeline behaviour tests.
pub struct PipelineWorld {
    /// Tracker that receives posted comments and status changes.
    pub tracker: InMemoryIssueTracker,
    /// Scripted first-stage service.
    pub analyzer: ScriptedComplianceAnalyzer,
    /// Scripted second-stage service.
    pub generator: ScriptedCaseGenerator,
    /// Orchestrator shared by ingestion and the scheduler.
    pub orchestrator: Arc<WorldOrchestrator>,
    /// Ingestion entry point.
    pub ingestion: IngestionService<InMemoryTaskStore, DefaultClock>,
    /// Tickets registered by the scenario, most recent last.
    pub tickets: Vec<TicketId>,
    /// Reasons given for events that did not start a run.
    pub ignored: Vec<IgnoreReason>,
}

impl PipelineWorld {
    /// Creates a world with fast pacing and immediately due retries.
    #[must_use]
    pub fn new() -> Self {
        let config = PipelineConfig::default()
            .with_min_ai_call_interval(MIN_AI_CALL_INTERVAL)
            .with_inter_stage_delay(Duration::from_millis(20))
            .with_task_wait_timeout(Duration::from_secs(5))
            .with_blocked_retry_delay(Duration::ZERO);
        let tracker = InMemoryIssueTracker::new();
        let analyzer = ScriptedComplianceAnalyzer::default();
        let generator = ScriptedCaseGenerator::default();
        let collaborators = Collaborators {
            tracker: Arc::new(tracker.clone()),
            analyzer: Arc::new(analyzer.clone()),
            generator: Arc::new(generator.clone()),
            notifier: Arc::new(CommentNotifier::new(Arc::new(tracker.clone()))),
        };
        let orchestrator = Arc::new(Orchestrator::new(
            TaskLedger::new(Arc::new(InMemoryTaskStore::new()), Arc::new(DefaultClock)),
            collaborators,
            Arc::new(config),
        ));
        let ingestion = IngestionService::new(Arc::clone(&orchestrator));
        Self {
            tracker,
            analyzer,
            generator,
            orchestrator,
            ingestion,
            tickets: Vec::new(),
            ignored: Vec::new(),
        }
    }

    /// Returns the most recently registered ticket.
    ///
    /// # Errors
    ///
    /// Returns an error when the scenario registered no ticket.
    pub fn current_ticket(&self) -> Result<TicketId, eyre::Report> {
        self.tickets
            .last()
            .cloned()
            .ok_or_else(|| eyre::eyre!("missing ticket in scenario world"))
    }
}

impl Default for PipelineWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> PipelineWorld {
    PipelineWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
