use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ident::{Identifier, QualifiedName};
use crate::types::DataType;

/// Column metadata for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Column {
    pub name: Identifier,
    pub data_type: DataType,
    /// Type string exactly as the catalog reported it.
    pub raw_type: String,
    pub nullable: bool,
    /// 1-based position within the table.
    pub ordinal: u32,
}

/// A table with its columns and declared keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Table {
    pub name: QualifiedName,
    /// Columns ordered by ordinal position.
    pub columns: Vec<Column>,
    /// Primary key columns in key order. Empty when none is declared.
    pub primary_key: Vec<Identifier>,
    /// Declared foreign keys that resolved against the graph this table belongs to.
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    pub fn column(&self, name: &Identifier) -> Option<&Column> {
        self.columns.iter().find(|column| &column.name == name)
    }

    pub fn has_column(&self, name: &Identifier) -> bool {
        self.column(name).is_some()
    }

    /// True when `columns` is exactly the primary key (order-insensitive).
    pub fn is_primary_key(&self, columns: &[Identifier]) -> bool {
        !self.primary_key.is_empty()
            && self.primary_key.len() == columns.len()
            && columns.iter().all(|column| self.primary_key.contains(column))
    }

    /// True when the table has a single-column primary key on `column`.
    pub fn is_sole_primary_key(&self, column: &Identifier) -> bool {
        self.primary_key.len() == 1 && &self.primary_key[0] == column
    }

    /// Compare structure while ignoring resolved foreign keys.
    pub(crate) fn same_definition(&self, other: &Table) -> bool {
        self.name == other.name
            && self.columns == other.columns
            && self.primary_key == other.primary_key
    }
}

/// A declared foreign key: local column(s) referencing target column(s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKey {
    pub name: Option<String>,
    pub source: QualifiedName,
    pub columns: Vec<Identifier>,
    pub target: QualifiedName,
    /// Referenced columns; empty when the catalog omitted them.
    pub target_columns: Vec<Identifier>,
}

/// Reference to one column of one table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ColumnRef {
    pub table: QualifiedName,
    pub column: Identifier,
}

impl ColumnRef {
    pub fn new(table: QualifiedName, column: Identifier) -> Self {
        Self { table, column }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}
