//! Domain model for the analysis pipeline.

mod event;
mod failure;
mod notice;
mod run;
mod ticket;

pub use event::{IgnoreReason, StatusEvent};
pub use failure::{FailureKind, classify};
pub use notice::Notice;
pub use run::{GenerationMode, RetryReport, RunPlan, RunReport, StageOutcome};
pub use ticket::{StatusChange, StatusTransition, TicketComment, TicketSnapshot};
