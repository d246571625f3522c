use crate::database::statement::Dialect;
use crate::database::statement::InsertBuilder;
use crate::database::statement::Statement;
use crate::database::table::TableSchema;
use crate::tabular::DataRow;

/// The statement sequence of one migration: database setup, table setup, then one
/// insertion per data row.
#[derive(Clone, Debug)]
pub struct MigrationScript {
    dialect: Dialect,
    database: String,
    table: String,
    escape_values: bool,
}

impl MigrationScript {
    pub fn new(dialect: Dialect, database: &str, table: &str) -> MigrationScript {
        MigrationScript {
            dialect,
            database: database.to_owned(),
            table: table.to_owned(),
            escape_values: false,
        }
    }

    /// Doubles single quotes inside inserted values.
    pub fn escape_values(mut self, escape_values: bool) -> MigrationScript {
        self.escape_values = escape_values;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Drops and recreates the database, then selects it.
    pub fn database_setup(&self) -> Vec<Statement> {
        vec![
            Statement::DropDatabase(self.database.to_owned()),
            Statement::CreateDatabase(self.database.to_owned()),
            Statement::UseDatabase(self.database.to_owned()),
        ]
    }

    /// Drops any previous table and creates it for `schema`.
    pub fn table_setup(&self, schema: &TableSchema) -> Vec<Statement> {
        let mut statements = vec![Statement::DropTable(schema.name().to_owned())];
        if self.dialect == Dialect::DuckDb {
            statements.push(Statement::CreateSequence(schema.id_sequence()));
        }
        statements.push(Statement::CreateTable(schema.clone()));
        statements
    }

    pub fn insert(&self, row: &DataRow) -> Statement {
        InsertBuilder::new(&self.table)
            .row(row)
            .escape_values(self.escape_values)
            .build()
    }
}
