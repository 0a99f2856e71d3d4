//! Ingestion through to the comments posted on the ticket.

use super::helpers::{Pipeline, cases, pipeline, scored};
use rstest::rstest;
use stagehand::{
    config::{DEFAULT_RETURNED_STATUS, PipelineConfig},
    pipeline::{
        domain::{IgnoreReason, StageOutcome},
        ports::AnalysisError,
        services::IngestOutcome,
    },
    task::domain::{ComplianceScore, Stage, StageStatus, TaskStatus},
};

#[rstest]
#[tokio::test(start_paused = true)]
async fn passing_ticket_gets_score_and_cases(pipeline: Pipeline) -> Result<(), eyre::Report> {
    let ticket = pipeline.add_ticket("DEV-1")?;
    pipeline.analyzer.push(scored(82));
    pipeline.generator.push(cases(6));

    let report = pipeline.run_to_end(&ticket, "Ready for QA").await?;

    eyre::ensure!(report.generation() == Some(StageOutcome::Completed));
    let record = pipeline.record(&ticket).await?;
    eyre::ensure!(record.task_status() == TaskStatus::Completed);
    eyre::ensure!(record.compliance_score().map(ComplianceScore::value) == Some(82));
    let comments = pipeline.tracker.posted_comments(&ticket);
    eyre::ensure!(comments.len() == 2, "unexpected comments: {comments:?}");
    eyre::ensure!(comments.iter().any(|body| body.contains("82%")));
    eyre::ensure!(comments.iter().any(|body| body.starts_with("Generated 6 test case(s)")));
    Ok(())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn low_score_moves_ticket_back(pipeline: Pipeline) -> Result<(), eyre::Report> {
    let ticket = pipeline.add_ticket("DEV-2")?;
    pipeline.analyzer.push(scored(41));

    pipeline.run_to_end(&ticket, "Ready for QA").await?;

    eyre::ensure!(pipeline.record(&ticket).await?.task_status() == TaskStatus::Returned);
    eyre::ensure!(
        pipeline.tracker.status_of(&ticket).as_deref() == Some(DEFAULT_RETURNED_STATUS)
    );
    eyre::ensure!(pipeline.generator.calls().is_empty());
    let comments = pipeline.tracker.posted_comments(&ticket);
    eyre::ensure!(
        comments
            .last()
            .is_some_and(|body| body.contains("below the 60% threshold")),
        "unexpected comments: {comments:?}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn returned_ticket_is_rechecked_on_reentry(pipeline: Pipeline) -> Result<(), eyre::Report> {
    let ticket = pipeline.add_ticket("DEV-3")?;
    pipeline.analyzer.push(scored(30));
    pipeline.analyzer.push(scored(77));
    pipeline.run_to_end(&ticket, "Ready for QA").await?;

    pipeline.tracker.push_transition(
        &ticket,
        DEFAULT_RETURNED_STATUS,
        "Ready for QA",
        chrono::Utc::now(),
    );
    let report = pipeline.run_to_end(&ticket, "Ready for QA").await?;

    eyre::ensure!(report.compliance() == Some(StageOutcome::Completed));
    let record = pipeline.record(&ticket).await?;
    eyre::ensure!(record.return_count() == 1);
    eyre::ensure!(record.task_status() == TaskStatus::Completed);
    let comments = pipeline.tracker.posted_comments(&ticket);
    eyre::ensure!(
        comments.iter().any(|body| body.starts_with("[Re-check]")),
        "no recheck comment in {comments:?}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn skip_code_bypasses_compliance(pipeline: Pipeline) -> Result<(), eyre::Report> {
    let ticket = pipeline.add_ticket("DEV-4")?;
    pipeline
        .tracker
        .push_comment(&ticket, "lead", "hotfix, ai_skip please", chrono::Utc::now());
    pipeline.generator.push(cases(2));

    pipeline.run_to_end(&ticket, "Ready for QA").await?;

    let record = pipeline.record(&ticket).await?;
    eyre::ensure!(record.stage_status(Stage::Compliance) == StageStatus::Skip);
    eyre::ensure!(record.skip_detected());
    eyre::ensure!(record.task_status() == TaskStatus::Completed);
    eyre::ensure!(pipeline.analyzer.calls().is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn duplicate_events_are_dropped(pipeline: Pipeline) -> Result<(), eyre::Report> {
    let ticket = pipeline.add_ticket("DEV-5")?;
    pipeline.analyzer.push(scored(90));
    pipeline.run_to_end(&ticket, "Ready for QA").await?;

    let outcome = pipeline.deliver(&ticket, "Ready for QA").await?;

    eyre::ensure!(
        matches!(
            outcome,
            IngestOutcome::Ignored(IgnoreReason::Duplicate {
                task_status: TaskStatus::Completed
            })
        ),
        "unexpected outcome: {outcome:?}"
    );
    eyre::ensure!(pipeline.analyzer.calls().len() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn compliance_only_status_skips_generation() -> Result<(), eyre::Report> {
    let pipeline = Pipeline::new(
        PipelineConfig::default()
            .with_trigger_statuses(["Code Review", "Ready for QA"])
            .with_generation_trigger_statuses(["Ready for QA"]),
    );
    let ticket = pipeline.add_ticket("DEV-6")?;
    pipeline.analyzer.push(scored(70));

    let report = pipeline.run_to_end(&ticket, "Code Review").await?;

    eyre::ensure!(report.generation().is_none());
    let record = pipeline.record(&ticket).await?;
    eyre::ensure!(record.task_status() == TaskStatus::Completed);
    eyre::ensure!(record.stage_status(Stage::Generation) == StageStatus::Pending);
    Ok(())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn missing_pull_request_degrades_generation(pipeline: Pipeline) -> Result<(), eyre::Report> {
    let ticket = pipeline.add_ticket("DEV-7")?;
    pipeline.analyzer.push(scored(88));
    pipeline
        .generator
        .push(Err(AnalysisError::new("PR not found for DEV-7")));
    pipeline.generator.push(cases(3));

    let report = pipeline.run_to_end(&ticket, "Ready for QA").await?;

    eyre::ensure!(report.generation() == Some(StageOutcome::Completed));
    let comments = pipeline.tracker.posted_comments(&ticket);
    eyre::ensure!(
        comments
            .iter()
            .any(|body| body.contains("without compliance context")),
        "no degraded comment in {comments:?}"
    );
    Ok(())
}
