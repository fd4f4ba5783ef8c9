mod error;
mod queries;
mod repository;
mod transaction;

pub use error::*;
pub use repository::*;
pub use transaction::*;

/// SQL migration for the initial schema (accounts, entries, transfers)
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");
