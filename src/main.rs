use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::{Env, Target};
use log::info;
use sheet2sql::{pipeline, Config, Dialect};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sheet2sql")]
#[command(author, version, about = "Migrate a spreadsheet worksheet into a SQL table through a CSV export")]
struct Cli {
    /// Workbook to migrate (.xls, .xla, .xlsx, .xlsm, .xlam)
    workbook: Option<PathBuf>,

    /// TOML settings file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Intermediate CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Worksheet to read (default: first sheet)
    #[arg(short, long)]
    sheet: Option<String>,

    /// Field delimiter of the CSV file
    #[arg(short, long)]
    delimiter: Option<char>,

    /// Database (DuckDB: schema) to recreate
    #[arg(long)]
    database: Option<String>,

    /// Table to create (default: the database name)
    #[arg(short, long)]
    table: Option<String>,

    /// SQL dialect of the generated statements
    #[arg(long, value_enum)]
    dialect: Option<DialectArg>,

    /// Double single quotes inside inserted values
    #[arg(long)]
    escape_values: bool,

    /// Read cells holding error values as empty text
    #[arg(long)]
    errors_as_empty: bool,

    /// Write the statements to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Execute the statements against this DuckDB database file
    #[arg(short = 'x', long)]
    execute: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum DialectArg {
    Mysql,
    Duckdb,
}

impl From<DialectArg> for Dialect {
    fn from(value: DialectArg) -> Self {
        match value {
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::Duckdb => Dialect::DuckDb,
        }
    }
}

impl Cli {
    /// Layers the flags over the settings file, or over the defaults without one.
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path).with_context(|| format!("Failed to load settings from '{}'", path.display()))?,
            None => Config::default(),
        };

        if let Some(workbook) = self.workbook {
            config.input.workbook = workbook;
        }
        if let Some(sheet) = self.sheet {
            config.input.sheet = Some(sheet);
        }
        if self.errors_as_empty {
            config.input.errors_as_empty = true;
        }
        if let Some(csv) = self.csv {
            config.export.path = csv;
        }
        if let Some(delimiter) = self.delimiter {
            config.export.delimiter = delimiter;
        }
        if let Some(database) = self.database {
            config.database.name = database;
        }
        if let Some(table) = self.table {
            config.database.table = Some(table);
        }
        if self.escape_values {
            config.output.escape_values = true;
        }
        if let Some(output) = self.output {
            config.output.script = Some(output);
        }
        if let Some(execute) = self.execute {
            config.output.execute = Some(execute);
            if self.dialect.is_none() {
                config.output.dialect = Dialect::DuckDb;
            }
        }
        if let Some(dialect) = self.dialect {
            config.output.dialect = dialect.into();
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stdout)
        .init();

    let config = Cli::parse().into_config()?;
    let summary = pipeline::run(&config)
        .with_context(|| format!("Failed to migrate '{}'", config.input.workbook.display()))?;
    info!(
        "Done: {} lines exported, {} columns, {} rows inserted",
        summary.exported_rows, summary.columns, summary.inserted_rows
    );
    Ok(())
}
