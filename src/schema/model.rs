//! Expected relational model.

use crate::workspace::{RECORDS_TABLE, RECORDS_TABLE_SQL};

/// One table of the expected model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// `CREATE TABLE` statement.
    pub ddl: String,
}

/// Tables a relational database must contain to be compatible.
///
/// The model only describes shape. Compatibility is decided by the
/// relational engine comparing its live schema against these tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaModel {
    tables: Vec<TableDef>,
}

impl SchemaModel {
    /// Model with no tables.
    #[must_use]
    pub const fn empty() -> Self {
        Self { tables: Vec::new() }
    }

    /// Model containing the workspace records table.
    #[must_use]
    pub fn standard() -> Self {
        Self::empty().with_table(RECORDS_TABLE, RECORDS_TABLE_SQL)
    }

    /// Adds a table, replacing any table with the same name.
    #[must_use]
    pub fn with_table(mut self, name: &str, ddl: &str) -> Self {
        self.tables.retain(|t| t.name != name);
        self.tables.push(TableDef {
            name: name.to_string(),
            ddl: ddl.trim().to_string(),
        });
        self
    }

    /// Tables in declaration order.
    #[must_use]
    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    /// All DDL joined into one batch.
    #[must_use]
    pub fn create_sql(&self) -> String {
        self.tables
            .iter()
            .map(|t| {
                let ddl = t.ddl.trim_end();
                if ddl.ends_with(';') {
                    ddl.to_string()
                } else {
                    format!("{ddl};")
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
