use crate::database::column::Column;
use crate::database::statement::Dialect;
use crate::tabular::HeaderRow;

/// Layout of the generated table: the `id` key followed by one text column per header.
#[derive(Clone, Debug, PartialEq)]
pub struct TableSchema {
    /// Table name
    pub(crate) name: String,
    /// Column definitions, `id` first
    pub(crate) columns: Vec<Column>,
}

impl TableSchema {
    /// Builds the schema for `headers`, keeping their order and any repeated names.
    pub fn infer(name: &str, headers: &HeaderRow) -> TableSchema {
        let columns = std::iter::once(Column::id())
            .chain(headers.names().iter().map(|header| Column::text(header)))
            .collect();
        TableSchema { name: name.to_owned(), columns }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Columns filled from the data rows, i.e. everything but `id`.
    pub fn data_columns(&self) -> &[Column] {
        &self.columns[1..]
    }

    /// Sequence feeding `id` where the dialect has no auto-increment key.
    pub(crate) fn id_sequence(&self) -> String {
        format!("{}_id_seq", self.name)
    }

    /// The `CREATE TABLE` statement text.
    pub(crate) fn to_create_sql(&self, dialect: Dialect) -> String {
        let mut sql = format!("CREATE TABLE {} (", dialect.quote_identifier(&self.name));
        match dialect {
            Dialect::MySql => {
                for column in &self.columns {
                    sql.push_str(&format!(
                        "{} {} {},",
                        dialect.quote_identifier(&column.name),
                        column.kind.as_sql(dialect),
                        if column.nullable { "NULL" } else { "NOT NULL" }
                    ));
                }
                sql.push_str(" UNIQUE KEY  `id_UNIQUE` (`id`)");
                sql.push_str(") ENGINE=InnoDB DEFAULT CHARSET=utf8 COLLATE=utf8_unicode_ci;");
            }
            Dialect::DuckDb => {
                for (index, column) in self.columns.iter().enumerate() {
                    sql.push_str(&dialect.quote_identifier(&column.name));
                    sql.push(' ');
                    sql.push_str(&column.kind.as_sql(dialect));
                    if index == 0 {
                        sql.push_str(&format!(" DEFAULT nextval({})", dialect.quote_literal(&self.id_sequence(), true)));
                    }
                    if !column.nullable {
                        sql.push_str(" NOT NULL");
                    }
                    sql.push_str(", ");
                }
                sql.push_str(&format!("UNIQUE ({}));", dialect.quote_identifier("id")));
            }
        }
        sql
    }
}
