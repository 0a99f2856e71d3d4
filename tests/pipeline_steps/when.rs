//! When steps for pipeline BDD scenarios.

use std::sync::Arc;

use super::{
    given::queue_score,
    world::{PipelineWorld, run_async},
};
use eyre::WrapErr;
use rstest_bdd_macros::when;
use stagehand::pipeline::{
    domain::StatusEvent,
    services::{IngestOutcome, PipelineHandle, RetryScheduler},
};
use stagehand::task::domain::TicketId;

fn dispatch(
    world: &PipelineWorld,
    ticket: TicketId,
    status: &str,
) -> Result<PipelineHandle, eyre::Report> {
    let outcome = run_async(world.ingestion.handle(StatusEvent::new(ticket, status)))
        .wrap_err("ingest status event")?;
    match outcome {
        IngestOutcome::Dispatched(handle) => Ok(handle),
        IngestOutcome::Ignored(reason) => Err(eyre::eyre!("event ignored: {reason:?}")),
    }
}

#[when(r#"the ticket moves to "{status}""#)]
fn ticket_moves(world: &mut PipelineWorld, status: String) -> Result<(), eyre::Report> {
    let ticket = world.current_ticket()?;
    let handle = dispatch(world, ticket, &status)?;
    run_async(handle.wait()).wrap_err("wait for pipeline run")?;
    Ok(())
}

#[when(r#"the same "{status}" event arrives again"#)]
fn same_event_again(world: &mut PipelineWorld, status: String) -> Result<(), eyre::Report> {
    let ticket = world.current_ticket()?;
    let outcome = run_async(world.ingestion.handle(StatusEvent::new(ticket, &status)))
        .wrap_err("ingest repeated status event")?;
    match outcome {
        IngestOutcome::Ignored(reason) => world.ignored.push(reason),
        IngestOutcome::Dispatched(handle) => {
            run_async(handle.wait()).wrap_err("wait for pipeline run")?;
        }
    }
    Ok(())
}

#[when(r#"both tickets move to "{status}" together"#)]
fn both_tickets_move(world: &mut PipelineWorld, status: String) -> Result<(), eyre::Report> {
    let handles = world
        .tickets
        .clone()
        .into_iter()
        .map(|ticket| dispatch(world, ticket, &status))
        .collect::<Result<Vec<_>, _>>()?;
    for handle in handles {
        run_async(handle.wait()).wrap_err("wait for pipeline run")?;
    }
    Ok(())
}

#[when("the compliance service recovers with a score of {score:i64}")]
fn compliance_recovers(world: &mut PipelineWorld, score: i64) -> Result<(), eyre::Report> {
    queue_score(world, score)
}

#[when("the retry scheduler runs once")]
fn scheduler_runs_once(world: &mut PipelineWorld) -> Result<(), eyre::Report> {
    let scheduler = RetryScheduler::new(Arc::clone(&world.orchestrator));
    let report = run_async(scheduler.run_cycle()).wrap_err("run retry cycle")?;
    eyre::ensure!(report.retried == 1, "unexpected cycle report: {report:?}");
    Ok(())
}
