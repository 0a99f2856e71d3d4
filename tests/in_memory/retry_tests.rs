//! Blocked tasks and the retry scheduler.

use std::sync::Arc;
use std::time::Duration;

use super::helpers::{Pipeline, cases, scored};
use rstest::{fixture, rstest};
use stagehand::{
    config::PipelineConfig,
    pipeline::{ports::AnalysisError, services::RetryScheduler},
    task::domain::{Stage, StageStatus, TaskStatus},
};

/// Pipeline whose blocked tasks are due immediately.
#[fixture]
fn pipeline() -> Pipeline {
    Pipeline::new(
        PipelineConfig::default()
            .with_blocked_retry_delay(Duration::ZERO)
            .with_blocked_check_interval(Duration::from_secs(10)),
    )
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn rate_limited_compliance_recovers_on_next_cycle(
    pipeline: Pipeline,
) -> Result<(), eyre::Report> {
    let ticket = pipeline.add_ticket("DEV-20")?;
    pipeline
        .analyzer
        .push(Err(AnalysisError::new("429 Too Many Requests")));
    pipeline.run_to_end(&ticket, "Ready for QA").await?;
    let blocked = pipeline.record(&ticket).await?;
    eyre::ensure!(blocked.task_status() == TaskStatus::Blocked);
    eyre::ensure!(blocked.blocked_stages() == vec![Stage::Compliance]);

    pipeline.analyzer.push(scored(80));
    pipeline.generator.push(cases(2));
    let report = RetryScheduler::new(Arc::clone(&pipeline.orchestrator))
        .run_cycle()
        .await?;

    eyre::ensure!(report.retried == 1, "unexpected cycle report: {report:?}");
    let record = pipeline.record(&ticket).await?;
    eyre::ensure!(record.task_status() == TaskStatus::Completed);
    eyre::ensure!(record.stage_status(Stage::Generation) == StageStatus::Done);
    eyre::ensure!(record.blocked_retry_at().is_none());
    let comments = pipeline.tracker.posted_comments(&ticket);
    eyre::ensure!(
        comments
            .first()
            .is_some_and(|body| body.contains("temporarily blocked")),
        "unexpected comments: {comments:?}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn background_scheduler_retries_blocked_generation(
    pipeline: Pipeline,
) -> Result<(), eyre::Report> {
    let ticket = pipeline.add_ticket("DEV-21")?;
    pipeline.analyzer.push(scored(95));
    pipeline
        .generator
        .push(Err(AnalysisError::new("model overloaded")));
    pipeline.run_to_end(&ticket, "Ready for QA").await?;
    eyre::ensure!(pipeline.record(&ticket).await?.blocked_stages() == vec![Stage::Generation]);

    pipeline.generator.push(cases(1));
    let scheduler = Arc::new(RetryScheduler::new(Arc::clone(&pipeline.orchestrator)));
    eyre::ensure!(scheduler.start());
    tokio::time::sleep(Duration::from_secs(60)).await;
    scheduler.stop().await;

    let record = pipeline.record(&ticket).await?;
    eyre::ensure!(record.task_status() == TaskStatus::Completed);
    eyre::ensure!(pipeline.analyzer.calls().len() == 1, "compliance ran again");
    eyre::ensure!(pipeline.generator.calls().len() == 2);
    Ok(())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn new_event_on_blocked_task_restarts_it(pipeline: Pipeline) -> Result<(), eyre::Report> {
    let ticket = pipeline.add_ticket("DEV-22")?;
    pipeline
        .analyzer
        .push(Err(AnalysisError::new("quota exhausted")));
    pipeline.run_to_end(&ticket, "Ready for QA").await?;

    pipeline.analyzer.push(scored(66));
    pipeline.run_to_end(&ticket, "Ready for QA").await?;

    let record = pipeline.record(&ticket).await?;
    eyre::ensure!(record.task_status() == TaskStatus::Completed);
    eyre::ensure!(record.blocked_at().is_none());
    Ok(())
}
