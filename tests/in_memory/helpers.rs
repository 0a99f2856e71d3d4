//! Shared wiring for the in-memory pipeline integration tests.

use std::sync::Arc;

use stagehand::{
    config::PipelineConfig,
    pipeline::{
        adapters::{
            CommentNotifier,
            memory::{InMemoryIssueTracker, ScriptedCaseGenerator, ScriptedComplianceAnalyzer},
        },
        domain::{RunReport, StatusEvent},
        ports::{AnalysisError, ComplianceReport, GeneratedCases},
        services::{Collaborators, IngestOutcome, IngestionService, Orchestrator},
    },
    task::{
        adapters::memory::InMemoryTaskStore,
        domain::{ComplianceScore, TaskRecord, TicketId},
        services::TaskLedger,
    },
};
use mockable::DefaultClock;
use rstest::fixture;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Routes pipeline logs through the test harness; `RUST_LOG` filters them.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .init();
    });
}

/// Orchestrator type used by the integration tests.
pub type TestOrchestrator = Orchestrator<InMemoryTaskStore, DefaultClock>;

/// A complete pipeline whose notices are posted back to the tracker.
pub struct Pipeline {
    pub tracker: InMemoryIssueTracker,
    pub analyzer: ScriptedComplianceAnalyzer,
    pub generator: ScriptedCaseGenerator,
    pub orchestrator: Arc<TestOrchestrator>,
    pub ingestion: IngestionService<InMemoryTaskStore, DefaultClock>,
}

impl Pipeline {
    /// Wires a pipeline with `config`.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        init_tracing();
        let tracker = InMemoryIssueTracker::new();
        let analyzer = ScriptedComplianceAnalyzer::default();
        let generator = ScriptedCaseGenerator::default();
        let collaborators = Collaborators {
            tracker: Arc::new(tracker.clone()),
            analyzer: Arc::new(analyzer.clone()),
            generator: Arc::new(generator.clone()),
            notifier: Arc::new(CommentNotifier::new(Arc::new(tracker.clone()))),
        };
        let ledger = TaskLedger::new(Arc::new(InMemoryTaskStore::new()), Arc::new(DefaultClock));
        let orchestrator = Arc::new(Orchestrator::new(ledger, collaborators, Arc::new(config)));
        let ingestion = IngestionService::new(Arc::clone(&orchestrator));
        Self {
            tracker,
            analyzer,
            generator,
            orchestrator,
            ingestion,
        }
    }

    /// Registers a ticket in the tracker.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is not a valid ticket key.
    pub fn add_ticket(&self, key: &str) -> Result<TicketId, eyre::Report> {
        let ticket = TicketId::new(key)?;
        self.tracker.insert_ticket(&ticket, "Integration ticket", "Backlog");
        Ok(ticket)
    }

    /// Delivers a status event.
    ///
    /// # Errors
    ///
    /// Returns an error if ingestion fails.
    pub async fn deliver(
        &self,
        ticket: &TicketId,
        status: &str,
    ) -> Result<IngestOutcome, eyre::Report> {
        Ok(self
            .ingestion
            .handle(StatusEvent::new(ticket.clone(), status))
            .await?)
    }

    /// Delivers a status event and waits for the run it starts.
    ///
    /// # Errors
    ///
    /// Returns an error if the event was ignored or the run failed.
    pub async fn run_to_end(
        &self,
        ticket: &TicketId,
        status: &str,
    ) -> Result<RunReport, eyre::Report> {
        match self.deliver(ticket, status).await? {
            IngestOutcome::Dispatched(handle) => Ok(handle.wait().await?),
            IngestOutcome::Ignored(reason) => Err(eyre::eyre!("event ignored: {reason:?}")),
        }
    }

    /// Loads the task record for `ticket`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or no record exists.
    pub async fn record(&self, ticket: &TicketId) -> Result<TaskRecord, eyre::Report> {
        self.orchestrator
            .ledger()
            .get(ticket)
            .await?
            .ok_or_else(|| eyre::eyre!("no task record for {ticket}"))
    }
}

/// Provides a pipeline with default settings.
#[fixture]
pub fn pipeline() -> Pipeline {
    Pipeline::new(PipelineConfig::default())
}

/// Builds a scored compliance result.
///
/// # Panics
///
/// Panics if `value` is outside 0..=100.
#[must_use]
pub fn scored(value: i64) -> Result<ComplianceReport, AnalysisError> {
    Ok(ComplianceReport {
        score: Some(ComplianceScore::new(value).expect("score in range")),
        analysis: format!("Ticket scored {value}."),
    })
}

/// Builds a generation result with `count` cases.
#[must_use]
pub fn cases(count: usize) -> Result<GeneratedCases, AnalysisError> {
    Ok(GeneratedCases {
        items: (1..=count).map(|n| format!("case {n}")).collect(),
    })
}
