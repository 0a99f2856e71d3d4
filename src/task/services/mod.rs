//! Application services for task record bookkeeping.

mod ledger;

pub use ledger::{CASCADE_ERROR, TaskLedger};
