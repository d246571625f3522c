//! # Schema & Statement Generator
//!
//! Infers a flat table from a header row, renders the statements of a migration
//! session in a SQL dialect and hands them to a sink: a script writer or an
//! embedded DuckDB database.
pub(crate) mod column;
pub(crate) mod script;
pub(crate) mod sink;
pub(crate) mod statement;
pub(crate) mod table;

use thiserror::Error;

/// Errors raised by the database boundary.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The database could not be opened or closed
    #[error("Connect to '{target}' failed: {source}")]
    Connection { target: String, source: duckdb::Error },

    /// The database rejected a statement; the migration stops there
    #[error("Statement rejected: {source}: {statement}")]
    Statement { statement: String, source: duckdb::Error },
}
