//! Then steps for pipeline BDD scenarios.

use super::world::{PipelineWorld, run_async};
use rstest_bdd_macros::then;
use stagehand::{
    config::DEFAULT_RETURNED_STATUS,
    pipeline::domain::{GenerationMode, IgnoreReason},
    task::domain::{Stage, StageStatus, TaskRecord, TaskStatus, TicketId},
};
use std::time::Duration;
use tokio::time::Instant;

fn current_record(world: &PipelineWorld) -> Result<TaskRecord, eyre::Report> {
    let ticket = world.current_ticket()?;
    run_async(world.orchestrator.ledger().get(&ticket))?
        .ok_or_else(|| eyre::eyre!("no task record for {ticket}"))
}

fn expect_stage(
    world: &PipelineWorld,
    stage: Stage,
    status: &str,
) -> Result<(), eyre::Report> {
    let expected = status
        .parse::<StageStatus>()
        .map_err(|err| eyre::eyre!("invalid expected stage status in scenario: {err}"))?;
    let actual = current_record(world)?.stage_status(stage);
    eyre::ensure!(
        actual == expected,
        "expected {stage} stage {expected}, found {actual}"
    );
    Ok(())
}

#[then(r#"the task status is "{status}""#)]
fn task_status_is(world: &PipelineWorld, status: String) -> Result<(), eyre::Report> {
    let expected = status
        .parse::<TaskStatus>()
        .map_err(|err| eyre::eyre!("invalid expected task status in scenario: {err}"))?;
    let actual = current_record(world)?.task_status();
    eyre::ensure!(
        actual == expected,
        "expected task status {expected}, found {actual}"
    );
    Ok(())
}

#[then(r#"the compliance stage is "{status}""#)]
fn compliance_stage_is(world: &PipelineWorld, status: String) -> Result<(), eyre::Report> {
    expect_stage(world, Stage::Compliance, &status)
}

#[then(r#"the generation stage is "{status}""#)]
fn generation_stage_is(world: &PipelineWorld, status: String) -> Result<(), eyre::Report> {
    expect_stage(world, Stage::Generation, &status)
}

#[then("the ticket was moved to the returned status")]
fn moved_to_returned(world: &PipelineWorld) -> Result<(), eyre::Report> {
    let ticket = world.current_ticket()?;
    let status = world.tracker.status_of(&ticket);
    eyre::ensure!(
        status.as_deref() == Some(DEFAULT_RETURNED_STATUS),
        "ticket is in {status:?}"
    );
    Ok(())
}

#[then(r#"a comment mentions "{text}""#)]
fn comment_mentions(world: &PipelineWorld, text: String) -> Result<(), eyre::Report> {
    let ticket = world.current_ticket()?;
    let comments = world.tracker.posted_comments(&ticket);
    eyre::ensure!(
        comments.iter().any(|body| body.contains(&text)),
        "no comment mentions {text:?}: {comments:?}"
    );
    Ok(())
}

#[then("the compliance service was not called")]
fn compliance_not_called(world: &PipelineWorld) -> Result<(), eyre::Report> {
    let calls = world.analyzer.calls().len();
    eyre::ensure!(calls == 0, "compliance service was called {calls} time(s)");
    Ok(())
}

#[then("the compliance service was called once")]
fn compliance_called_once(world: &PipelineWorld) -> Result<(), eyre::Report> {
    let calls = world.analyzer.calls().len();
    eyre::ensure!(calls == 1, "compliance service was called {calls} time(s)");
    Ok(())
}

#[then("the repeated event was ignored as a duplicate")]
fn repeated_event_ignored(world: &PipelineWorld) -> Result<(), eyre::Report> {
    eyre::ensure!(
        matches!(world.ignored.as_slice(), [IgnoreReason::Duplicate { .. }]),
        "expected one duplicate, got {:?}",
        world.ignored
    );
    Ok(())
}

#[then("the case generator ran in degraded mode")]
fn generator_ran_degraded(world: &PipelineWorld) -> Result<(), eyre::Report> {
    let modes: Vec<GenerationMode> = world
        .generator
        .calls()
        .into_iter()
        .map(|call| call.detail)
        .collect();
    eyre::ensure!(
        modes == [GenerationMode::Degraded],
        "unexpected generation modes: {modes:?}"
    );
    Ok(())
}

#[then("the case generator was not called")]
fn generator_not_called(world: &PipelineWorld) -> Result<(), eyre::Report> {
    let calls = world.generator.calls().len();
    eyre::ensure!(calls == 0, "case generator was called {calls} time(s)");
    Ok(())
}

fn call_log(world: &PipelineWorld) -> Vec<(Instant, TicketId)> {
    let mut log: Vec<_> = world
        .analyzer
        .calls()
        .into_iter()
        .map(|call| (call.at, call.ticket_id))
        .chain(
            world
                .generator
                .calls()
                .into_iter()
                .map(|call| (call.at, call.ticket_id)),
        )
        .collect();
    log.sort_by_key(|(at, _)| *at);
    log
}

#[then("AI calls are at least {millis:u64} ms apart")]
fn calls_are_spaced(world: &PipelineWorld, millis: u64) -> Result<(), eyre::Report> {
    let log = call_log(world);
    eyre::ensure!(log.len() >= 2, "expected several AI calls, saw {}", log.len());
    let minimum = Duration::from_millis(millis);
    for pair in log.windows(2) {
        if let [(earlier, _), (later, _)] = pair {
            let gap = later.duration_since(*earlier);
            eyre::ensure!(gap >= minimum, "AI calls only {gap:?} apart");
        }
    }
    Ok(())
}

#[then("no two runs overlapped")]
fn runs_did_not_overlap(world: &PipelineWorld) -> Result<(), eyre::Report> {
    let log = call_log(world);
    for run in log.chunks(2) {
        if let [(_, first), (_, second)] = run {
            eyre::ensure!(first == second, "runs for {first} and {second} interleaved");
        }
    }
    Ok(())
}
