//! Given steps for pipeline BDD scenarios.

use super::world::PipelineWorld;
use stagehand::{
    pipeline::ports::{AnalysisError, ComplianceReport, GeneratedCases},
    task::domain::{ComplianceScore, TicketId},
};
use rstest_bdd_macros::given;

/// Queues a scored compliance result.
///
/// # Errors
///
/// Returns an error when `score` is outside 0..=100.
pub fn queue_score(world: &PipelineWorld, score: i64) -> Result<(), eyre::Report> {
    world.analyzer.push(Ok(ComplianceReport {
        score: Some(ComplianceScore::new(score)?),
        analysis: format!("Scenario score {score}."),
    }));
    Ok(())
}

fn register(world: &mut PipelineWorld, key: &str) -> Result<TicketId, eyre::Report> {
    let ticket = TicketId::new(key)?;
    world.tracker.insert_ticket(&ticket, "Scenario ticket", "Backlog");
    world.tickets.push(ticket.clone());
    Ok(ticket)
}

#[given(r#"a ticket "{key}""#)]
fn a_ticket(world: &mut PipelineWorld, key: String) -> Result<(), eyre::Report> {
    register(world, &key)?;
    Ok(())
}

#[given("the compliance service scores {score:i64}")]
fn compliance_scores(world: &mut PipelineWorld, score: i64) -> Result<(), eyre::Report> {
    queue_score(world, score)
}

#[given(r#"the compliance service fails with "{message}""#)]
fn compliance_fails(world: &mut PipelineWorld, message: String) {
    world.analyzer.push(Err(AnalysisError::new(message)));
}

#[given("the case generator returns {count:usize} cases")]
fn generator_returns(world: &mut PipelineWorld, count: usize) {
    world.generator.push(Ok(GeneratedCases {
        items: (1..=count).map(|n| format!("case {n}")).collect(),
    }));
}

#[given(r#"the ticket has a comment "{body}""#)]
fn ticket_has_comment(world: &mut PipelineWorld, body: String) -> Result<(), eyre::Report> {
    let ticket = world.current_ticket()?;
    world
        .tracker
        .push_comment(&ticket, "reviewer", &body, chrono::Utc::now());
    Ok(())
}

#[given(r#"tickets "{first}" and "{second}" that both score {score:i64}"#)]
fn two_tickets(
    world: &mut PipelineWorld,
    first: String,
    second: String,
    score: i64,
) -> Result<(), eyre::Report> {
    for key in [first, second] {
        register(world, &key)?;
        queue_score(world, score)?;
    }
    Ok(())
}
