//! Sequences the two stages under one hold of the AI access gate.

use super::{Collaborators, PipelineError, PipelineResult, StageRunner};
use crate::config::{OrderingPolicy, PipelineConfig};
use crate::gate::{AccessGate, AccessPermit, GateError};
use crate::pipeline::domain::{Notice, RetryReport, RunPlan, RunReport, StageOutcome};
use crate::task::{
    domain::{Stage, StageStatus, TaskStatus, TicketId},
    ports::TaskStore,
    services::TaskLedger,
};
use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns the stage runners and the gate; the single entry point used by
/// ingestion and the retry scheduler.
pub struct Orchestrator<S, C>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    runner: StageRunner<S, C>,
    gate: AccessGate,
    config: Arc<PipelineConfig>,
}

impl<S, C> Orchestrator<S, C>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    /// Creates an orchestrator with its own gate paced at the configured
    /// `min_ai_call_interval`.
    #[must_use]
    pub fn new(
        ledger: TaskLedger<S, C>,
        collaborators: Collaborators,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            runner: StageRunner::new(ledger, collaborators, Arc::clone(&config)),
            gate: AccessGate::new(config.min_ai_call_interval()),
            config,
        }
    }

    /// Replaces the gate with one shared by other orchestrators that call
    /// the same upstream AI dependency.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::GateMismatch`] when the gate's pacing
    /// interval differs from the configured one.
    pub fn with_shared_gate(mut self, gate: AccessGate) -> PipelineResult<Self> {
        let configured = self.config.min_ai_call_interval();
        if gate.min_interval() != configured {
            return Err(PipelineError::GateMismatch {
                gate: gate.min_interval(),
                configured,
            });
        }
        self.gate = gate;
        Ok(self)
    }

    /// Returns the task ledger.
    #[must_use]
    pub const fn ledger(&self) -> &TaskLedger<S, C> {
        self.runner.ledger()
    }

    /// Returns the stage runner.
    #[must_use]
    pub const fn runner(&self) -> &StageRunner<S, C> {
        &self.runner
    }

    /// Returns the pipeline configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the access gate.
    #[must_use]
    pub const fn gate(&self) -> &AccessGate {
        &self.gate
    }

    /// Derives the run plan for an external status.
    #[must_use]
    pub fn plan_for(&self, external_status: &str) -> RunPlan {
        RunPlan {
            run_generation: self.config.is_generation_trigger(external_status),
        }
    }

    /// Applies the skip code, then runs the planned stages.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`](super::PipelineError::Store) when the
    /// task store fails.
    pub async fn process(&self, ticket_id: &TicketId, plan: RunPlan) -> PipelineResult<RunReport> {
        self.runner.apply_skip_code(ticket_id).await?;
        self.run(ticket_id, plan).await
    }

    /// Runs the planned stages in the configured order while holding the
    /// gate once for the whole sequence.
    ///
    /// On a gate timeout nothing runs: both stages are marked with the
    /// timeout and a queue-timeout notice goes out.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`](super::PipelineError::Store) when the
    /// task store fails.
    pub async fn run(&self, ticket_id: &TicketId, plan: RunPlan) -> PipelineResult<RunReport> {
        let mut permit = match self.gate.acquire(self.config.task_wait_timeout()).await {
            Ok(permit) => permit,
            Err(err) => {
                self.record_queue_timeout(ticket_id, err).await?;
                return Ok(RunReport::QueueTimeout);
            }
        };

        let report = if self.config.ordering() == OrderingPolicy::Stage2First
            && plan.run_generation
            && self.generation_allowed(ticket_id).await?
        {
            self.generation_first(&mut permit, ticket_id).await?
        } else {
            self.compliance_first(&mut permit, ticket_id, plan).await?
        };
        self.finalize(ticket_id, plan).await?;
        drop(permit);
        Ok(report)
    }

    /// Retries the blocked stages of one task.
    ///
    /// Compliance is retried first when it was blocked; generation is only
    /// attempted afterwards when compliance completed and the generation
    /// gate holds.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`](super::PipelineError::Store) when the
    /// task store fails.
    pub async fn retry_blocked(&self, ticket_id: &TicketId) -> PipelineResult<RetryReport> {
        let Ok(mut permit) = self.gate.acquire(self.config.task_wait_timeout()).await else {
            info!(ticket = %ticket_id, "gate busy, retry deferred to next cycle");
            return Ok(RetryReport::GateBusy);
        };
        let ledger = self.ledger();
        let Some(record) = ledger.get(ticket_id).await? else {
            return Ok(RetryReport::NotBlocked);
        };
        if record.task_status() != TaskStatus::Blocked {
            return Ok(RetryReport::NotBlocked);
        }

        let plan = self.plan_for(record.last_external_status().unwrap_or_default());
        let stage2_before = record.stage_status(Stage::Generation);
        info!(ticket = %ticket_id, stages = ?record.blocked_stages(), "retrying blocked task");
        ledger.mark_resumed(ticket_id).await?;

        let mut compliance = None;
        if record.stage_status(Stage::Compliance) == StageStatus::Blocked {
            ledger.reset_stage(ticket_id, Stage::Compliance).await?;
            let outcome = self.runner.run_compliance(&mut permit, ticket_id).await?;
            compliance = Some(outcome);
            if outcome != StageOutcome::Completed {
                debug!(ticket = %ticket_id, ?outcome, "compliance retry did not complete");
                self.finalize(ticket_id, plan).await?;
                return Ok(RetryReport::Retried(RunReport::Ran {
                    compliance,
                    generation: None,
                }));
            }
        }

        let generation = match stage2_before {
            StageStatus::Blocked => {
                ledger.reset_stage(ticket_id, Stage::Generation).await?;
                self.gated_generation(&mut permit, ticket_id, compliance.is_some())
                    .await?
            }
            StageStatus::Pending if plan.run_generation => {
                self.gated_generation(&mut permit, ticket_id, compliance.is_some())
                    .await?
            }
            _ => None,
        };
        self.finalize(ticket_id, plan).await?;
        Ok(RetryReport::Retried(RunReport::Ran {
            compliance,
            generation,
        }))
    }

    async fn compliance_first(
        &self,
        permit: &mut AccessPermit,
        ticket_id: &TicketId,
        plan: RunPlan,
    ) -> PipelineResult<RunReport> {
        let compliance = self.runner.run_compliance(permit, ticket_id).await?;
        let generation = if plan.run_generation {
            self.gated_generation(permit, ticket_id, made_call(compliance))
                .await?
        } else {
            None
        };
        Ok(RunReport::Ran {
            compliance: Some(compliance),
            generation,
        })
    }

    async fn generation_first(
        &self,
        permit: &mut AccessPermit,
        ticket_id: &TicketId,
    ) -> PipelineResult<RunReport> {
        let generation = self.runner.run_generation(permit, ticket_id).await?;
        if made_call(generation) {
            tokio::time::sleep(self.config.inter_stage_delay()).await;
        }
        let compliance = self.runner.run_compliance(permit, ticket_id).await?;
        Ok(RunReport::Ran {
            compliance: Some(compliance),
            generation: Some(generation),
        })
    }

    /// Runs generation if the gate holds before and after the inter-stage
    /// delay.
    async fn gated_generation(
        &self,
        permit: &mut AccessPermit,
        ticket_id: &TicketId,
        delay: bool,
    ) -> PipelineResult<Option<StageOutcome>> {
        if !self.generation_allowed(ticket_id).await? {
            debug!(ticket = %ticket_id, "generation gate closed");
            return Ok(None);
        }
        if delay {
            tokio::time::sleep(self.config.inter_stage_delay()).await;
            if !self.generation_allowed(ticket_id).await? {
                debug!(ticket = %ticket_id, "generation gate closed during delay");
                return Ok(None);
            }
        }
        Ok(Some(self.runner.run_generation(permit, ticket_id).await?))
    }

    async fn generation_allowed(&self, ticket_id: &TicketId) -> PipelineResult<bool> {
        let threshold = self.config.return_threshold();
        let record = self.ledger().get(ticket_id).await?;
        Ok(record.is_some_and(|task| task.may_run_generation(threshold)))
    }

    /// Completes a still-progressing task whose planned stages have settled.
    async fn finalize(&self, ticket_id: &TicketId, plan: RunPlan) -> PipelineResult<()> {
        let Some(record) = self.ledger().get(ticket_id).await? else {
            return Ok(());
        };
        let compliance_settled = record.stage_status(Stage::Compliance).is_settled();
        let generation_settled =
            !plan.run_generation || record.stage_status(Stage::Generation).is_settled();
        if record.task_status() == TaskStatus::Progressing
            && compliance_settled
            && generation_settled
        {
            self.ledger().mark_completed(ticket_id).await?;
            info!(ticket = %ticket_id, "task completed");
        }
        Ok(())
    }

    async fn record_queue_timeout(&self, ticket_id: &TicketId, err: GateError) -> PipelineResult<()> {
        let GateError::Timeout { waited } = err;
        let message = err.to_string();
        self.ledger()
            .mark_queue_timeout(ticket_id, &message)
            .await?;
        warn!(ticket = %ticket_id, waited_secs = waited.as_secs(), "AI queue wait timed out");
        self.runner
            .notify(
                ticket_id,
                Notice::QueueTimeout {
                    waited_secs: waited.as_secs(),
                },
            )
            .await;
        Ok(())
    }
}

/// Whether a stage outcome involved an AI call.
const fn made_call(outcome: StageOutcome) -> bool {
    !matches!(outcome, StageOutcome::AlreadySettled | StageOutcome::Missing)
}
