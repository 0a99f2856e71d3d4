//! Port contracts for task record persistence.
//!
//! Ports define infrastructure-agnostic interfaces used by the task ledger.

pub mod store;

pub use store::{TaskStore, TaskStoreError, TaskStoreResult};
