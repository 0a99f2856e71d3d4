//! Gate exclusivity and AI call spacing across concurrent tickets.

use std::time::Duration;

use super::helpers::{Pipeline, cases, scored};
use rstest::rstest;
use stagehand::{
    config::PipelineConfig,
    pipeline::{
        domain::RunReport,
        services::{IngestOutcome, PipelineHandle},
    },
    task::domain::{Stage, StageStatus, TaskStatus, TicketId},
};
use tokio::time::Instant;

async fn dispatch_all(
    pipeline: &Pipeline,
    keys: &[&str],
) -> Result<Vec<(TicketId, PipelineHandle)>, eyre::Report> {
    let mut handles = Vec::new();
    for key in keys {
        let ticket = pipeline.add_ticket(key)?;
        pipeline.analyzer.push(scored(80));
        pipeline.generator.push(cases(1));
        match pipeline.deliver(&ticket, "Ready for QA").await? {
            IngestOutcome::Dispatched(handle) => handles.push((ticket, handle)),
            IngestOutcome::Ignored(reason) => eyre::bail!("{key} ignored: {reason:?}"),
        }
    }
    Ok(handles)
}

/// Every AI call in issue order, tagged with its ticket.
fn call_log(pipeline: &Pipeline) -> Vec<(Instant, TicketId)> {
    let mut log: Vec<_> = pipeline
        .analyzer
        .calls()
        .into_iter()
        .map(|call| (call.at, call.ticket_id))
        .chain(
            pipeline
                .generator
                .calls()
                .into_iter()
                .map(|call| (call.at, call.ticket_id)),
        )
        .collect();
    log.sort_by_key(|(at, _)| *at);
    log
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn concurrent_tickets_are_serialised_and_paced() -> Result<(), eyre::Report> {
    let pipeline = Pipeline::new(
        PipelineConfig::default()
            .with_min_ai_call_interval(Duration::from_secs(6))
            .with_inter_stage_delay(Duration::from_secs(15))
            .with_task_wait_timeout(Duration::from_secs(120)),
    );

    let handles = dispatch_all(&pipeline, &["DEV-30", "DEV-31", "DEV-32"]).await?;
    for (_, handle) in handles {
        handle.wait().await?;
    }

    let log = call_log(&pipeline);
    eyre::ensure!(log.len() == 6, "expected six AI calls, saw {}", log.len());
    for pair in log.windows(2) {
        if let [(earlier, _), (later, _)] = pair {
            eyre::ensure!(
                *later - *earlier >= Duration::from_secs(6),
                "AI calls closer than the minimum interval"
            );
        }
    }
    for run in log.chunks(2) {
        if let [(_, first), (_, second)] = run {
            eyre::ensure!(first == second, "runs for {first} and {second} interleaved");
        }
    }
    Ok(())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn queued_ticket_times_out_when_gate_stays_busy() -> Result<(), eyre::Report> {
    let pipeline = Pipeline::new(
        PipelineConfig::default()
            .with_inter_stage_delay(Duration::from_secs(15))
            .with_task_wait_timeout(Duration::from_secs(20)),
    );

    let handles = dispatch_all(&pipeline, &["DEV-40", "DEV-41", "DEV-42"]).await?;
    let mut timed_out = Vec::new();
    for (ticket, handle) in handles {
        if handle.wait().await? == RunReport::QueueTimeout {
            timed_out.push(ticket);
        }
    }

    let [ticket] = timed_out.as_slice() else {
        eyre::bail!("expected exactly one queue timeout, got {timed_out:?}");
    };
    let record = pipeline.record(ticket).await?;
    eyre::ensure!(record.task_status() == TaskStatus::Error);
    eyre::ensure!(record.stage_status(Stage::Compliance) == StageStatus::Error);
    eyre::ensure!(record.stage_status(Stage::Generation) == StageStatus::Error);
    let comments = pipeline.tracker.posted_comments(ticket);
    eyre::ensure!(
        comments.iter().any(|body| body.contains("AI queue stayed busy")),
        "unexpected comments: {comments:?}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn gate_is_released_after_every_run() -> Result<(), eyre::Report> {
    let pipeline = Pipeline::new(PipelineConfig::default());
    let handles = dispatch_all(&pipeline, &["DEV-50"]).await?;
    for (_, handle) in handles {
        handle.wait().await?;
    }

    eyre::ensure!(!pipeline.orchestrator.gate().is_held());
    Ok(())
}
