//! Collaborator adapters.
//!
//! - [`memory`]: in-memory tracker, scripted AI services and a recording
//!   notifier
//! - [`comment::CommentNotifier`]: renders notices and posts them as
//!   tracker comments

pub mod comment;
pub mod memory;

pub use comment::CommentNotifier;
