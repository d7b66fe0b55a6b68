//! Shared database schema, migrations, and query builders.
//!
//! Every builder returns a [`Built`] `(sql, values)` pair; the server binds
//! the values and runs it against SQLite.

pub mod cars;
pub mod dashboard;
pub mod events;
pub mod listing;
pub mod migrations;
pub mod modifications;
pub mod tables;
pub mod tokens;
pub mod users;

// Re-export tables for convenience
pub use tables::*;

pub type Built = (String, sea_query::Values);

/// Count + page queries for one list request.
pub struct BuiltList {
    pub count_query: Built,
    pub select_query: Built,
    pub applied: listing::Applied,
}
