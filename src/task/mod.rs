//! Durable per-ticket pipeline state.
//!
//! A task record tracks one ticket through the two analysis stages: the
//! overall task status, each stage's status and error, the compliance score,
//! return and skip bookkeeping, and the block fields used by the retry
//! scheduler. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Named state transitions in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
