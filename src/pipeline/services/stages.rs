//! Stage runners: one AI-backed call per stage plus its bookkeeping.
//!
//! Runners never decide whether generation may run; the orchestrator checks
//! the gate before calling [`StageRunner::run_generation`].

use super::{Collaborators, PipelineError, PipelineResult, detect_recheck, detect_skip};
use crate::config::PipelineConfig;
use crate::gate::AccessPermit;
use crate::pipeline::{
    domain::{FailureKind, GenerationMode, Notice, StageOutcome, classify},
    ports::{AnalysisError, AnalysisResult, ComplianceReport, GeneratedCases},
};
use crate::task::{
    domain::{ComplianceScore, Stage, StageStatus, TicketId},
    ports::TaskStore,
    services::TaskLedger,
};
use futures::FutureExt;
use mockable::Clock;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Runs the compliance and generation stages for one ticket.
pub struct StageRunner<S, C>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    ledger: TaskLedger<S, C>,
    collaborators: Collaborators,
    config: Arc<PipelineConfig>,
}

impl<S, C> Clone for StageRunner<S, C>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            collaborators: self.collaborators.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

/// A failed AI-backed call with its category fixed at the stage boundary.
struct StageFailure {
    error: AnalysisError,
    kind: FailureKind,
}

impl From<AnalysisError> for StageFailure {
    fn from(error: AnalysisError) -> Self {
        let kind = classify(&error.message);
        Self { error, kind }
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Awaits one AI-backed call. A panic inside the call is logged and
/// becomes an `unknown` failure of `stage`.
async fn guarded<T>(
    ticket_id: &TicketId,
    stage: Stage,
    call: impl Future<Output = AnalysisResult<T>>,
) -> Result<T, StageFailure> {
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result.map_err(StageFailure::from),
        Err(payload) => {
            let detail = panic_detail(payload.as_ref());
            error!(ticket = %ticket_id, %stage, panic = detail, "stage call panicked");
            Err(StageFailure {
                error: AnalysisError::new(format!("{stage} call panicked: {detail}")),
                kind: FailureKind::Unknown,
            })
        }
    }
}

fn log_store_failure(ticket_id: &TicketId, stage: Stage, err: &PipelineError) {
    error!(ticket = %ticket_id, %stage, error = %err, "stage aborted by task store failure");
}

impl<S, C> StageRunner<S, C>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    /// Creates a runner.
    #[must_use]
    pub const fn new(
        ledger: TaskLedger<S, C>,
        collaborators: Collaborators,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            ledger,
            collaborators,
            config,
        }
    }

    /// Returns the task ledger.
    #[must_use]
    pub const fn ledger(&self) -> &TaskLedger<S, C> {
        &self.ledger
    }

    /// Returns the pipeline configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Marks compliance skipped when the skip code is present in recent
    /// comments. Returns whether the skip was applied.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`] when recording the skip fails.
    pub async fn apply_skip_code(&self, ticket_id: &TicketId) -> PipelineResult<bool> {
        let code = self.config.skip_code();
        let found = detect_skip(
            self.collaborators.tracker.as_ref(),
            ticket_id,
            code,
            self.config.max_comments_to_scan_for_skip(),
        )
        .await;
        if !found {
            return Ok(false);
        }
        self.ledger
            .mark_compliance_skipped(ticket_id)
            .await
            .map_err(PipelineError::from)
            .inspect_err(|err| log_store_failure(ticket_id, Stage::Compliance, err))?;
        info!(ticket = %ticket_id, code, "skip code found, compliance bypassed");
        self.notify(
            ticket_id,
            Notice::Skipped {
                code: code.to_owned(),
            },
        )
        .await;
        Ok(true)
    }

    /// Runs compliance unless it already settled.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`] when the task store fails. Analyzer
    /// failures are classified and recorded instead.
    pub async fn run_compliance(
        &self,
        permit: &mut AccessPermit,
        ticket_id: &TicketId,
    ) -> PipelineResult<StageOutcome> {
        self.compliance(permit, ticket_id)
            .await
            .inspect_err(|err| log_store_failure(ticket_id, Stage::Compliance, err))
    }

    /// Runs generation unless it already settled. Generation runs degraded
    /// when compliance ended in `error`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`] when the task store fails. Generator
    /// failures are classified and recorded instead.
    pub async fn run_generation(
        &self,
        permit: &mut AccessPermit,
        ticket_id: &TicketId,
    ) -> PipelineResult<StageOutcome> {
        self.generation(permit, ticket_id)
            .await
            .inspect_err(|err| log_store_failure(ticket_id, Stage::Generation, err))
    }

    async fn compliance(
        &self,
        permit: &mut AccessPermit,
        ticket_id: &TicketId,
    ) -> PipelineResult<StageOutcome> {
        let Some(record) = self.ledger.get(ticket_id).await? else {
            return Ok(StageOutcome::Missing);
        };
        if record.stage_status(Stage::Compliance).is_settled() {
            debug!(ticket = %ticket_id, "compliance already settled");
            return Ok(StageOutcome::AlreadySettled);
        }

        let recheck = detect_recheck(
            self.collaborators.tracker.as_ref(),
            ticket_id,
            self.config.returned_status_name(),
        )
        .await;
        permit.pace().await;
        info!(ticket = %ticket_id, recheck, "compliance started");
        let call = self.collaborators.analyzer.analyze(ticket_id);
        match guarded(ticket_id, Stage::Compliance, call).await {
            Ok(report) => self.record_compliance(ticket_id, report, recheck).await,
            Err(failure) => {
                self.record_failure(ticket_id, Stage::Compliance, &failure)
                    .await
            }
        }
    }

    async fn record_compliance(
        &self,
        ticket_id: &TicketId,
        report: ComplianceReport,
        recheck: bool,
    ) -> PipelineResult<StageOutcome> {
        let ComplianceReport { score, analysis } = report;
        self.ledger
            .mark_stage_done(ticket_id, Stage::Compliance, score)
            .await?;
        info!(ticket = %ticket_id, score = ?score.map(ComplianceScore::value), "compliance finished");
        self.notify(
            ticket_id,
            Notice::ComplianceChecked {
                score: score.map(ComplianceScore::value),
                analysis,
                recheck,
            },
        )
        .await;

        match score {
            Some(value) if value.is_below(self.config.return_threshold()) => {
                self.return_ticket(ticket_id, value).await
            }
            _ => Ok(StageOutcome::Completed),
        }
    }

    async fn return_ticket(
        &self,
        ticket_id: &TicketId,
        score: ComplianceScore,
    ) -> PipelineResult<StageOutcome> {
        let target = self.config.returned_status_name();
        let transitioned =
            self.config.transition_on_return() && self.move_to_returned(ticket_id, target).await;
        self.ledger.mark_returned(ticket_id).await?;
        let threshold = self.config.return_threshold();
        warn!(
            ticket = %ticket_id,
            score = score.value(),
            threshold = threshold.value(),
            transitioned,
            "ticket returned for clarification"
        );
        self.notify(
            ticket_id,
            Notice::Returned {
                score: score.value(),
                threshold: threshold.value(),
                target_status: target.to_owned(),
                transitioned,
            },
        )
        .await;
        Ok(StageOutcome::Returned)
    }

    async fn move_to_returned(&self, ticket_id: &TicketId, target: &str) -> bool {
        match self
            .collaborators
            .tracker
            .change_status(ticket_id, target)
            .await
        {
            Ok(change) => {
                if !change.accepted {
                    warn!(
                        ticket = %ticket_id,
                        target_status = target,
                        message = %change.message,
                        "status change refused"
                    );
                }
                change.accepted
            }
            Err(error) => {
                warn!(ticket = %ticket_id, target_status = target, %error, "status change failed");
                false
            }
        }
    }

    async fn generation(
        &self,
        permit: &mut AccessPermit,
        ticket_id: &TicketId,
    ) -> PipelineResult<StageOutcome> {
        let Some(record) = self.ledger.get(ticket_id).await? else {
            return Ok(StageOutcome::Missing);
        };
        if record.stage_status(Stage::Generation).is_settled() {
            debug!(ticket = %ticket_id, "generation already settled");
            return Ok(StageOutcome::AlreadySettled);
        }
        let mode = if record.stage_status(Stage::Compliance) == StageStatus::Error {
            GenerationMode::Degraded
        } else {
            GenerationMode::Full
        };

        let attempt = match self.attempt_generation(permit, ticket_id, mode).await {
            Err(failure) if self.should_degrade(mode, &failure) => {
                info!(
                    ticket = %ticket_id,
                    error = %failure.error,
                    "retrying generation in degraded mode"
                );
                self.attempt_generation(permit, ticket_id, GenerationMode::Degraded)
                    .await
                    .map(|cases| (cases, GenerationMode::Degraded))
            }
            other => other.map(|cases| (cases, mode)),
        };
        match attempt {
            Ok((cases, used)) => self.record_generation(ticket_id, &cases, used).await,
            Err(failure) => {
                self.record_failure(ticket_id, Stage::Generation, &failure)
                    .await
            }
        }
    }

    fn should_degrade(&self, mode: GenerationMode, failure: &StageFailure) -> bool {
        mode == GenerationMode::Full
            && self.config.degraded_fallback()
            && failure.kind == FailureKind::MissingDependency
    }

    async fn attempt_generation(
        &self,
        permit: &mut AccessPermit,
        ticket_id: &TicketId,
        mode: GenerationMode,
    ) -> Result<GeneratedCases, StageFailure> {
        permit.pace().await;
        info!(ticket = %ticket_id, ?mode, "generation started");
        let call = self.collaborators.generator.generate(ticket_id, mode);
        guarded(ticket_id, Stage::Generation, call).await
    }

    async fn record_generation(
        &self,
        ticket_id: &TicketId,
        cases: &GeneratedCases,
        mode: GenerationMode,
    ) -> PipelineResult<StageOutcome> {
        self.ledger
            .mark_stage_done(ticket_id, Stage::Generation, None)
            .await?;
        let degraded = mode == GenerationMode::Degraded;
        info!(ticket = %ticket_id, count = cases.items.len(), degraded, "generation finished");
        self.notify(
            ticket_id,
            Notice::CasesGenerated {
                count: cases.items.len(),
                degraded,
            },
        )
        .await;
        Ok(StageOutcome::Completed)
    }

    async fn record_failure(
        &self,
        ticket_id: &TicketId,
        stage: Stage,
        failure: &StageFailure,
    ) -> PipelineResult<StageOutcome> {
        let err = &failure.error;
        let kind = failure.kind;
        if kind == FailureKind::RateLimitOrTimeout {
            let record = self
                .ledger
                .mark_blocked(
                    ticket_id,
                    stage,
                    &err.message,
                    self.config.blocked_retry_delay(),
                )
                .await?;
            let retry_at = record
                .blocked_retry_at()
                .unwrap_or_else(|| self.ledger.now());
            warn!(ticket = %ticket_id, %stage, error = %err, %retry_at, "stage blocked, retry scheduled");
            self.notify(
                ticket_id,
                Notice::Blocked {
                    stage,
                    reason: err.message.clone(),
                    retry_at,
                },
            )
            .await;
            return Ok(StageOutcome::Blocked);
        }

        let keep_generation_pending = kind == FailureKind::MissingDependency;
        self.ledger
            .mark_stage_failed(ticket_id, stage, &err.message, keep_generation_pending)
            .await?;
        error!(ticket = %ticket_id, %stage, %kind, error = %err, "stage failed");
        self.notify(
            ticket_id,
            Notice::StageFailed {
                stage,
                category: kind,
                message: err.message.clone(),
            },
        )
        .await;
        Ok(StageOutcome::Failed(kind))
    }

    /// Delivers a notice; delivery failures are logged and swallowed.
    pub(super) async fn notify(&self, ticket_id: &TicketId, notice: Notice) {
        if let Err(error) = self.collaborators.notifier.notify(ticket_id, &notice).await {
            warn!(ticket = %ticket_id, kind = notice.kind(), %error, "notification failed");
        }
    }
}
