//! # Spreadsheet to SQL Migration
//!
//! Moves one worksheet of an Excel workbook into a SQL table in three steps: the
//! rows are read and exported as delimited text, a flat table is inferred from the
//! header line, and the session statements plus one insertion per data row are
//! handed to a sink.
//!
//! ## Features
//!
//! - **Two workbook formats**: Excel 97-2003 (`.xls`, `.xla`) and Excel 2007+
//!   (`.xlsx`, `.xlsm`, `.xlam`), parsed without external tools
//! - **Text-only tables**: a synthetic unsigned `id` plus one `VARCHAR(255)` column
//!   per header, in header order
//! - **Two dialects**: MySQL scripts, or DuckDB statements executed against a
//!   database file
//! - **Settings file**: every setting defaults to the stock migration and can be
//!   overridden from TOML or the command line
pub mod config;
pub mod database;
pub mod error;
pub mod pipeline;
pub mod spreadsheet;
pub mod tabular;

pub(crate) mod helpers;

pub use crate::config::Config;
pub use crate::database::column::Column;
pub use crate::database::column::ColumnType;
pub use crate::database::script::MigrationScript;
pub use crate::database::sink::DuckDbSink;
pub use crate::database::sink::ScriptSink;
pub use crate::database::sink::StatementSink;
pub use crate::database::statement::Dialect;
pub use crate::database::statement::Insert;
pub use crate::database::statement::InsertBuilder;
pub use crate::database::statement::Statement;
pub use crate::database::table::TableSchema;
pub use crate::error::MigrationError;
pub use crate::pipeline::MigrationSummary;
pub use crate::spreadsheet::ReadOptions;
pub use crate::spreadsheet::Workbook;
pub use crate::spreadsheet::WorkbookFormat;
pub use crate::tabular::DataRow;
pub use crate::tabular::HeaderRow;
pub use crate::tabular::TableReader;
