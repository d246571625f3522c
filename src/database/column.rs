use crate::database::statement::Dialect;

/// Column types a generated table declares.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ColumnType {
    /// Synthetic row identifier
    UnsignedInteger,
    /// Text of at most the given number of characters
    Varchar(u16),
}

impl ColumnType {
    /// Type name as written in a column declaration.
    pub(crate) fn as_sql(&self, dialect: Dialect) -> String {
        match (self, dialect) {
            (ColumnType::UnsignedInteger, Dialect::MySql) => "int(10) unsigned".to_owned(),
            (ColumnType::UnsignedInteger, Dialect::DuckDb) => "UINTEGER".to_owned(),
            (ColumnType::Varchar(length), _) => format!("VARCHAR({length})"),
        }
    }
}

/// A column declaration: name, type and nullability.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
    pub nullable: bool,
}

impl Column {
    /// Width of every text column.
    pub const TEXT_LENGTH: u16 = 255;

    /// The synthetic `id` key column.
    pub fn id() -> Column {
        Column {
            name: "id".to_owned(),
            kind: ColumnType::UnsignedInteger,
            nullable: false,
        }
    }

    /// A nullable text column named after a header.
    pub fn text(name: &str) -> Column {
        Column {
            name: name.to_owned(),
            kind: ColumnType::Varchar(Self::TEXT_LENGTH),
            nullable: true,
        }
    }
}
