//! # Migration Settings
//!
//! Every setting has a default, so an empty file (or no file at all) describes the
//! stock migration of `Apulian_Database.xls` into the `apulian` database.
use crate::database::statement::Dialect;
use crate::error::MigrationError;
use serde::Deserialize;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or checking the settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Read config '{0}' failed: {1}")]
    ReadError(String, std::io::Error),

    #[error("Parse config '{0}' failed: {1}")]
    ParseError(String, toml::de::Error),

    #[error("Delimiter '{0}' must be a single ASCII character")]
    DelimiterError(char),

    #[error("The {0} name must not be empty")]
    EmptyNameError(&'static str),

    #[error("Executing statements requires the duckdb dialect, got {0}")]
    ExecuteDialectError(Dialect),

    #[error("Choose either a script file or a database to execute against, not both")]
    OutputConflictError,
}

/// Settings of one migration run.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub input: InputConfig,
    pub export: ExportConfig,
    pub database: DatabaseConfig,
    pub output: OutputConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    pub workbook: PathBuf,
    /// First worksheet when unset
    pub sheet: Option<String>,
    pub errors_as_empty: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        InputConfig {
            workbook: PathBuf::from("Apulian_Database.xls"),
            sheet: None,
            errors_as_empty: false,
        }
    }
}

/// Where the intermediate delimited text goes.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub path: PathBuf,
    pub delimiter: char,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            path: PathBuf::from("Apulian_Database.csv"),
            delimiter: ',',
        }
    }
}

#[derive(Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub name: String,
    /// Defaults to the database name
    pub table: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            host: "localhost".to_owned(),
            port: 8889,
            username: "root".to_owned(),
            password: String::new(),
            name: "apulian".to_owned(),
            table: None,
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("name", &self.name)
            .field("table", &self.table)
            .finish()
    }
}

impl DatabaseConfig {
    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }

    /// Command line that feeds a generated script to the MySQL client.
    /// The password is never spelled out; `-p` prompts for it when one is set.
    pub fn client_command(&self) -> String {
        let mut command = format!("mysql -h {} -P {} -u {}", self.host, self.port, self.username);
        if !self.password.is_empty() {
            command.push_str(" -p");
        }
        command
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dialect: Dialect,
    /// Double single quotes inside inserted values
    pub escape_values: bool,
    /// Script file; standard output when unset
    pub script: Option<PathBuf>,
    /// DuckDB database file to run the statements against
    pub execute: Option<PathBuf>,
}

impl Config {
    /// Loads settings from a TOML file; missing keys keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, MigrationError> {
        let path = path.as_ref();
        let name = path.to_string_lossy().into_owned();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(name.to_owned(), e))?;
        let config = toml::from_str(&text).map_err(|e| ConfigError::ParseError(name, e))?;
        Ok(config)
    }

    /// Checks the settings that cannot be expressed in their types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.export.delimiter.is_ascii() {
            Err(ConfigError::DelimiterError(self.export.delimiter))?
        }
        if self.database.name.is_empty() {
            Err(ConfigError::EmptyNameError("database"))?
        }
        if self.database.table_name().is_empty() {
            Err(ConfigError::EmptyNameError("table"))?
        }
        if self.output.execute.is_some() {
            if self.output.dialect != Dialect::DuckDb {
                Err(ConfigError::ExecuteDialectError(self.output.dialect))?
            }
            if self.output.script.is_some() {
                Err(ConfigError::OutputConflictError)?
            }
        }
        Ok(())
    }

    /// The delimiter as the byte the delimited-text codec works with.
    pub fn delimiter(&self) -> u8 {
        if self.export.delimiter.is_ascii() {
            self.export.delimiter as u8
        } else {
            b','
        }
    }
}
