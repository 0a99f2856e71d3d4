//! Persistence adapters for task records.
//!
//! - [`memory::InMemoryTaskStore`]: thread-safe in-memory storage for tests
//!   and single-process deployments
//! - [`postgres::PostgresTaskStore`]: `PostgreSQL` persistence using Diesel

pub mod memory;
pub mod postgres;
