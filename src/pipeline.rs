//! # Migration Pipeline
//!
//! Runs the three stages in order: read the workbook and export it as delimited
//! text, infer the table from the exported header, then hand the session statements
//! and one insertion per data row to a statement sink.
use crate::config::Config;
use crate::database::script::MigrationScript;
use crate::database::sink::DuckDbSink;
use crate::database::sink::ScriptSink;
use crate::database::sink::StatementSink;
use crate::database::table::TableSchema;
use crate::error::MigrationError;
use crate::error::ResultMessage;
use crate::spreadsheet::ReadOptions;
use crate::spreadsheet::Workbook;
use crate::tabular;
use crate::tabular::TableReader;
use log::debug;
use log::info;
use std::fs::File;
use std::io::BufWriter;

/// What a finished migration did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MigrationSummary {
    /// Worksheet the rows were read from
    pub sheet: String,
    /// Lines written to the delimited text, header included
    pub exported_rows: usize,
    /// Data columns of the created table, `id` excluded
    pub columns: usize,
    /// Insertion statements handed to the sink
    pub inserted_rows: usize,
}

/// Runs the migration described by `config` against the sink it selects.
pub fn run(config: &Config) -> Result<MigrationSummary, MigrationError> {
    config.validate()?;
    let dialect = config.output.dialect;

    if let Some(path) = &config.output.execute {
        info!("Connecting to database '{}'", path.display());
        return migrate(config, DuckDbSink::open(path)?);
    }

    info!("Connecting to database");
    debug!("Run the script with: {} < script.sql", config.database.client_command());
    match &config.output.script {
        Some(path) => {
            let file = File::create(path)
                .map_err(MigrationError::from)
                .with_prefix(&format!("Create '{}' failed", path.display()))?;
            migrate(config, ScriptSink::new(BufWriter::new(file), dialect))
        }
        None => migrate(config, ScriptSink::new(std::io::stdout().lock(), dialect)),
    }
}

/// Runs every stage, handing each statement to `sink` as soon as it is built.
/// The first failing statement stops the migration.
pub fn migrate<S: StatementSink>(config: &Config, mut sink: S) -> Result<MigrationSummary, MigrationError> {
    let delimiter = config.delimiter();
    let script = MigrationScript::new(sink.dialect(), &config.database.name, config.database.table_name())
        .escape_values(config.output.escape_values);

    info!("Setting up database");
    for statement in script.database_setup() {
        sink.execute(&statement)?;
    }

    info!("Converting {} to {}", config.input.workbook.display(), config.export.path.display());
    let options = ReadOptions {
        sheet: config.input.sheet.to_owned(),
        errors_as_empty: config.input.errors_as_empty,
    };
    let workbook = Workbook::open(&config.input.workbook, &options)?;
    let exported_rows = tabular::export(&workbook, &config.export.path, delimiter)?;

    info!("Creating table script");
    let mut reader = TableReader::open(&config.export.path, delimiter)?;
    let schema = TableSchema::infer(script.table(), reader.headers());
    for statement in script.table_setup(&schema) {
        sink.execute(&statement)?;
    }

    let mut inserted_rows = 0;
    while let Some(row) = reader.next_row()? {
        sink.execute(&script.insert(&row))?;
        inserted_rows += 1;
    }
    sink.finish()?;

    let summary = MigrationSummary {
        sheet: workbook.sheet_name().to_owned(),
        exported_rows,
        columns: schema.data_columns().len(),
        inserted_rows,
    };
    info!(
        "Migrated {} rows of sheet '{}' into table '{}'",
        summary.inserted_rows,
        summary.sheet,
        script.table()
    );
    Ok(summary)
}
