//! Two-stage ticket analysis pipeline.
//!
//! A qualifying status change on a ticket starts a run: the compliance stage
//! scores the ticket, and the generation stage produces test cases when the
//! score allows it. Both stages call one rate-limited AI dependency, so runs
//! are serialised through [`crate::gate::AccessGate`].
//!
//! - [`domain`]: events, notices, failure classification and run reports
//! - [`ports`]: tracker, AI stage and notifier contracts
//! - [`adapters`]: in-memory collaborators and the comment notifier
//! - [`services`]: stage runners, orchestration, retries and ingestion

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
