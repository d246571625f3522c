//! SQL statements of a migration session and their rendering per dialect.
use crate::database::table::TableSchema;
use crate::tabular::DataRow;
use serde::Deserialize;
use std::fmt::Display;

/// SQL flavor statements are rendered in.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Backtick identifiers, `int(10) unsigned` key, InnoDB table options
    #[default]
    MySql,
    /// Double-quoted identifiers, sequence-fed `UINTEGER` key, schemas for databases
    DuckDb,
}

impl Dialect {
    pub fn quote_identifier(&self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            Dialect::DuckDb => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Wraps `value` in single quotes, doubling embedded quotes only when `escape` is set.
    pub fn quote_literal(&self, value: &str, escape: bool) -> String {
        if escape {
            format!("'{}'", value.replace('\'', "''"))
        } else {
            format!("'{value}'")
        }
    }
}

impl Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::MySql => write!(f, "mysql"),
            Dialect::DuckDb => write!(f, "duckdb"),
        }
    }
}

/// A row insertion with its columns and values in matching order.
#[derive(Clone, Debug, PartialEq)]
pub struct Insert {
    table: String,
    pairs: Vec<(String, String)>,
    escape_values: bool,
}

impl Insert {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> + '_ {
        self.pairs.iter().map(|(column, _)| column.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> + '_ {
        self.pairs.iter().map(|(_, value)| value.as_str())
    }

    fn to_sql(&self, dialect: Dialect) -> String {
        let columns: Vec<String> = self.columns().map(|column| dialect.quote_identifier(column)).collect();
        let values: Vec<String> = self.values().map(|value| dialect.quote_literal(value, self.escape_values)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({});",
            dialect.quote_identifier(&self.table),
            columns.join(", "),
            values.join(", ")
        )
    }
}

/// Collects (column, value) pairs for one insertion.
///
/// Values become text literals as they are; with `escape_values` embedded single
/// quotes are doubled.
#[derive(Clone, Debug, Default)]
pub struct InsertBuilder {
    table: String,
    pairs: Vec<(String, String)>,
    escape_values: bool,
}

impl InsertBuilder {
    pub fn new(table: &str) -> InsertBuilder {
        InsertBuilder {
            table: table.to_owned(),
            ..InsertBuilder::default()
        }
    }

    pub fn value(mut self, column: &str, value: &str) -> InsertBuilder {
        self.pairs.push((column.to_owned(), value.to_owned()));
        self
    }

    /// Appends every pair of `row` in order.
    pub fn row(mut self, row: &DataRow) -> InsertBuilder {
        self.pairs.extend(row.pairs().iter().cloned());
        self
    }

    pub fn escape_values(mut self, escape_values: bool) -> InsertBuilder {
        self.escape_values = escape_values;
        self
    }

    pub fn build(self) -> Statement {
        Statement::Insert(Insert {
            table: self.table,
            pairs: self.pairs,
            escape_values: self.escape_values,
        })
    }
}

/// One standalone statement of a migration session.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    DropDatabase(String),
    CreateDatabase(String),
    UseDatabase(String),
    DropTable(String),
    /// Sequence feeding the `id` column (DuckDB only)
    CreateSequence(String),
    CreateTable(TableSchema),
    Insert(Insert),
}

impl Statement {
    /// Renders the statement as SQL text for `dialect`.
    pub fn render(&self, dialect: Dialect) -> String {
        match (self, dialect) {
            (Statement::DropDatabase(name), Dialect::MySql) => format!("DROP DATABASE IF EXISTS {};", dialect.quote_identifier(name)),
            (Statement::DropDatabase(name), Dialect::DuckDb) => format!("DROP SCHEMA IF EXISTS {} CASCADE;", dialect.quote_identifier(name)),
            (Statement::CreateDatabase(name), Dialect::MySql) => format!("CREATE DATABASE {};", dialect.quote_identifier(name)),
            (Statement::CreateDatabase(name), Dialect::DuckDb) => format!("CREATE SCHEMA {};", dialect.quote_identifier(name)),
            (Statement::UseDatabase(name), Dialect::MySql) => format!("USE {};", dialect.quote_identifier(name)),
            (Statement::UseDatabase(name), Dialect::DuckDb) => format!("SET schema = {};", dialect.quote_literal(name, true)),
            (Statement::DropTable(name), _) => format!("DROP TABLE IF EXISTS {};", dialect.quote_identifier(name)),
            (Statement::CreateSequence(name), _) => format!("CREATE SEQUENCE {} START 1;", dialect.quote_identifier(name)),
            (Statement::CreateTable(schema), _) => schema.to_create_sql(dialect),
            (Statement::Insert(insert), _) => insert.to_sql(dialect),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::HeaderRow;
    use pretty_assertions::assert_eq;

    #[test]
    fn builds_insert_in_header_order() {
        let headers = HeaderRow::new(["Name", "Year"]);
        let row = DataRow::new(&headers, &["Vase", "400"]);
        let statement = InsertBuilder::new("apulian").row(&row).build();
        assert_eq!(statement.render(Dialect::MySql), "INSERT INTO `apulian` (`Name`, `Year`) VALUES ('Vase', '400');");
        assert_eq!(statement.render(Dialect::DuckDb), "INSERT INTO \"apulian\" (\"Name\", \"Year\") VALUES ('Vase', '400');");

        let Statement::Insert(insert) = statement else { panic!("expected an insert") };
        assert_eq!(insert.table(), "apulian");
        assert_eq!(insert.columns().count(), insert.values().count());
    }

    #[test]
    fn values_are_not_escaped_by_default() {
        let statement = InsertBuilder::new("apulian").value("Name", "Dionysos' cup").build();
        assert_eq!(statement.render(Dialect::MySql), "INSERT INTO `apulian` (`Name`) VALUES ('Dionysos' cup');");

        let statement = InsertBuilder::new("apulian").value("Name", "Dionysos' cup").escape_values(true).build();
        assert_eq!(statement.render(Dialect::MySql), "INSERT INTO `apulian` (`Name`) VALUES ('Dionysos'' cup');");
    }

    #[test]
    fn identifiers_escape_their_quote_character() {
        assert_eq!(Dialect::MySql.quote_identifier("Instrument`s"), "`Instrument``s`");
        assert_eq!(Dialect::DuckDb.quote_identifier("Say \"when\""), "\"Say \"\"when\"\"\"");
    }

    #[test]
    fn renders_session_statements() {
        assert_eq!(Statement::DropDatabase("apulian".to_owned()).render(Dialect::MySql), "DROP DATABASE IF EXISTS `apulian`;");
        assert_eq!(Statement::CreateDatabase("apulian".to_owned()).render(Dialect::MySql), "CREATE DATABASE `apulian`;");
        assert_eq!(Statement::UseDatabase("apulian".to_owned()).render(Dialect::MySql), "USE `apulian`;");
        assert_eq!(Statement::DropTable("apulian".to_owned()).render(Dialect::MySql), "DROP TABLE IF EXISTS `apulian`;");
        assert_eq!(Statement::DropDatabase("apulian".to_owned()).render(Dialect::DuckDb), "DROP SCHEMA IF EXISTS \"apulian\" CASCADE;");
        assert_eq!(Statement::UseDatabase("apulian".to_owned()).render(Dialect::DuckDb), "SET schema = 'apulian';");
        assert_eq!(Statement::CreateSequence("apulian_id_seq".to_owned()).render(Dialect::DuckDb), "CREATE SEQUENCE \"apulian_id_seq\" START 1;");
    }
}
