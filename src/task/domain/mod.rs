//! Domain model for the per-ticket task record.
//!
//! A task record tracks one external ticket through the two analysis stages.
//! All mutation goes through [`TaskPatch`], which the store applies
//! atomically; the record itself never talks to infrastructure.

mod error;
mod ids;
mod patch;
mod record;
mod status;

pub use error::{ParseStatusError, TaskDomainError};
pub use ids::{ComplianceScore, TicketId};
pub use patch::TaskPatch;
pub use record::{PersistedTaskData, TaskRecord};
pub use status::{Stage, StageStatus, TaskStatus};
