//! Stagehand: status-driven, two-stage ticket analysis.
//!
//! When a ticket in an issue tracker moves into a configured status, a
//! compliance check scores it and, when the score allows it, a second stage
//! generates test cases. Each ticket has a durable task record, transient
//! failures are retried on a schedule, and every outcome is reported back
//! on the ticket.
//!
//! # Architecture
//!
//! Each bounded context follows hexagonal architecture: pure domain types,
//! port traits for infrastructure, adapters implementing them, and services
//! that coordinate the two.
//!
//! # Modules
//!
//! - [`task`]: per-ticket task records and their stores
//! - [`gate`]: exclusive, paced access to the AI dependency
//! - [`pipeline`]: ingestion, orchestration, stage runners and retries
//! - [`config`]: pipeline settings and their TOML loader

pub mod config;
pub mod gate;
pub mod pipeline;
pub mod task;
