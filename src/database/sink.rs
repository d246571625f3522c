//! Destinations for rendered statements.
use crate::database::statement::Dialect;
use crate::database::statement::Statement;
use crate::database::DatabaseError;
use crate::error::MigrationError;
use duckdb::Connection;
use log::debug;
use std::io::Write;
use std::path::Path;

/// Receives the statements of a migration one at a time, in order.
pub trait StatementSink {
    /// Dialect the sink renders statements in.
    fn dialect(&self) -> Dialect;

    /// Handles a single statement; a failure stops the migration.
    fn execute(&mut self, statement: &Statement) -> Result<(), MigrationError>;

    /// Flushes or closes the underlying resource.
    fn finish(self) -> Result<(), MigrationError>
    where
        Self: Sized;
}

/// Writes each statement on its own line, e.g. to stdout or a `.sql` file.
pub struct ScriptSink<W: Write> {
    writer: W,
    dialect: Dialect,
}

impl<W: Write> ScriptSink<W> {
    pub fn new(writer: W, dialect: Dialect) -> ScriptSink<W> {
        ScriptSink { writer, dialect }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> StatementSink for ScriptSink<W> {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn execute(&mut self, statement: &Statement) -> Result<(), MigrationError> {
        writeln!(self.writer, "{}", statement.render(self.dialect))?;
        Ok(())
    }

    fn finish(mut self) -> Result<(), MigrationError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Executes statements against a DuckDB database file, each one on its own.
pub struct DuckDbSink {
    target: String,
    connection: Connection,
}

impl DuckDbSink {
    /// Opens the database at `path`, creating the file when missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<DuckDbSink, MigrationError> {
        let target = path.as_ref().to_string_lossy().into_owned();
        let connection = Connection::open(path.as_ref()).map_err(|source| DatabaseError::Connection {
            target: target.to_owned(),
            source,
        })?;
        Ok(DuckDbSink { target, connection })
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<DuckDbSink, MigrationError> {
        let target = ":memory:".to_owned();
        let connection = Connection::open_in_memory().map_err(|source| DatabaseError::Connection {
            target: target.to_owned(),
            source,
        })?;
        Ok(DuckDbSink { target, connection })
    }

    /// Runs a query returning a single count, e.g. to check what a migration left behind.
    pub fn count(&self, sql: &str) -> Result<i64, MigrationError> {
        let count = self.connection
            .query_row(sql, [], |row| row.get::<_, i64>(0))
            .map_err(|source| DatabaseError::Statement { statement: sql.to_owned(), source })?;
        Ok(count)
    }
}

impl StatementSink for DuckDbSink {
    fn dialect(&self) -> Dialect {
        Dialect::DuckDb
    }

    fn execute(&mut self, statement: &Statement) -> Result<(), MigrationError> {
        let sql = statement.render(Dialect::DuckDb);
        debug!("Executing on '{}': {}", self.target, sql);
        self.connection
            .execute_batch(&sql)
            .map_err(|source| DatabaseError::Statement { statement: sql, source })?;
        Ok(())
    }

    fn finish(self) -> Result<(), MigrationError> {
        let target = self.target;
        self.connection
            .close()
            .map_err(|(_, source)| DatabaseError::Connection { target, source })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::statement::InsertBuilder;
    use crate::database::table::TableSchema;
    use crate::tabular::HeaderRow;
    use pretty_assertions::assert_eq;

    #[test]
    fn script_sink_writes_one_statement_per_line() {
        let mut sink = ScriptSink::new(Vec::new(), Dialect::MySql);
        sink.execute(&Statement::UseDatabase("apulian".to_owned())).unwrap();
        sink.execute(&InsertBuilder::new("apulian").value("Name", "Vase").build()).unwrap();
        assert_eq!(
            String::from_utf8(sink.into_inner()).unwrap(),
            "USE `apulian`;\nINSERT INTO `apulian` (`Name`) VALUES ('Vase');\n"
        );
    }

    #[test]
    fn duckdb_sink_executes_statements() {
        let mut sink = DuckDbSink::open_in_memory().unwrap();
        let schema = TableSchema::infer("apulian", &HeaderRow::new(["Name", "Year"]));
        for statement in [
            Statement::DropDatabase("apulian".to_owned()),
            Statement::CreateDatabase("apulian".to_owned()),
            Statement::UseDatabase("apulian".to_owned()),
            Statement::DropTable("apulian".to_owned()),
            Statement::CreateSequence(schema.id_sequence()),
            Statement::CreateTable(schema),
            InsertBuilder::new("apulian").value("Name", "Vase").value("Year", "400").build(),
            InsertBuilder::new("apulian").value("Name", "Krater").value("Year", "-350").build(),
        ] {
            sink.execute(&statement).unwrap();
        }

        assert_eq!(sink.count("SELECT count(*) FROM apulian.apulian").unwrap(), 2);
        assert_eq!(sink.count("SELECT CAST(max(id) AS BIGINT) FROM apulian.apulian").unwrap(), 2);
        sink.finish().unwrap();
    }

    #[test]
    fn rejected_statement_carries_its_text() {
        let mut sink = DuckDbSink::open_in_memory().unwrap();
        let insert = InsertBuilder::new("missing").value("Name", "Vase").build();
        let error = sink.execute(&insert).unwrap_err();
        match error {
            MigrationError::DatabaseError(DatabaseError::Statement { statement, .. }) => {
                assert_eq!(statement, "INSERT INTO \"missing\" (\"Name\") VALUES ('Vase');")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn database_file_is_created() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("apulian.duckdb");
        let sink = DuckDbSink::open(&path).unwrap();
        sink.finish().unwrap();
        assert!(path.exists());
    }
}
