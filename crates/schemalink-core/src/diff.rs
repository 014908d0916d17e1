use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::graph::{Cardinality, EdgeKey, RelationshipEdge, SchemaGraph, SnapshotVersion};
use crate::ident::QualifiedName;
use crate::schema::{Column, ColumnRef, Table};
use crate::types::DataType;

/// Objects present on one side of a diff only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Delta {
    pub tables: Vec<QualifiedName>,
    /// Columns of tables present in both graphs.
    pub columns: Vec<ColumnRef>,
    pub edges: Vec<EdgeKey>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.columns.is_empty() && self.edges.is_empty()
    }
}

/// Normalized and raw type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnTypeInfo {
    pub data_type: DataType,
    pub raw_type: String,
}

impl From<&Column> for ColumnTypeInfo {
    fn from(column: &Column) -> Self {
        Self {
            data_type: column.data_type,
            raw_type: column.raw_type.clone(),
        }
    }
}

/// What a change is about.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ChangeSubject {
    Table(QualifiedName),
    Column(ColumnRef),
    Edge(EdgeKey),
}

/// Before/after values of the attribute that differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "attribute", rename_all = "snake_case")]
pub enum AttributeChange {
    ColumnType {
        before: ColumnTypeInfo,
        after: ColumnTypeInfo,
    },
    Nullable {
        before: bool,
        after: bool,
    },
    Ordinal {
        before: u32,
        after: u32,
    },
    PrimaryKey {
        before: Vec<String>,
        after: Vec<String>,
    },
    Confidence {
        before: f64,
        after: f64,
    },
    Cardinality {
        before: Cardinality,
        after: Cardinality,
    },
}

impl AttributeChange {
    pub fn attribute(&self) -> &'static str {
        match self {
            AttributeChange::ColumnType { .. } => "column_type",
            AttributeChange::Nullable { .. } => "nullable",
            AttributeChange::Ordinal { .. } => "ordinal",
            AttributeChange::PrimaryKey { .. } => "primary_key",
            AttributeChange::Confidence { .. } => "confidence",
            AttributeChange::Cardinality { .. } => "cardinality",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Change {
    pub subject: ChangeSubject,
    pub change: AttributeChange,
}

/// Structural differences between two graphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DiffResult {
    pub old_version: SnapshotVersion,
    pub new_version: SnapshotVersion,
    pub added: Delta,
    pub removed: Delta,
    pub changed: Vec<Change>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Compare two graphs. Neither input is modified.
///
/// Tables are matched by qualified name and columns by name. Edges are matched on
/// endpoints, columns and kind; a different confidence or cardinality on a matched
/// edge is a change, not an add/remove pair.
pub fn diff(old: &SchemaGraph, new: &SchemaGraph) -> DiffResult {
    let mut added = Delta::default();
    let mut removed = Delta::default();
    let mut changed = Vec::new();

    let old_tables: BTreeMap<String, &Table> =
        old.tables().map(|table| (table.name.key(), table)).collect();
    let new_tables: BTreeMap<String, &Table> =
        new.tables().map(|table| (table.name.key(), table)).collect();

    for (key, table) in &old_tables {
        match new_tables.get(key) {
            Some(other) => diff_table(table, other, &mut added, &mut removed, &mut changed),
            None => removed.tables.push(table.name.clone()),
        }
    }
    for (key, table) in &new_tables {
        if !old_tables.contains_key(key) {
            added.tables.push(table.name.clone());
        }
    }

    let old_edges: BTreeMap<EdgeKey, &RelationshipEdge> =
        old.edges().iter().map(|edge| (edge.key(), edge)).collect();
    let new_edges: BTreeMap<EdgeKey, &RelationshipEdge> =
        new.edges().iter().map(|edge| (edge.key(), edge)).collect();

    for (key, edge) in &old_edges {
        let Some(other) = new_edges.get(key) else {
            removed.edges.push(key.clone());
            continue;
        };
        if (edge.confidence - other.confidence).abs() > f64::EPSILON {
            changed.push(Change {
                subject: ChangeSubject::Edge(key.clone()),
                change: AttributeChange::Confidence {
                    before: edge.confidence,
                    after: other.confidence,
                },
            });
        }
        if edge.cardinality != other.cardinality {
            changed.push(Change {
                subject: ChangeSubject::Edge(key.clone()),
                change: AttributeChange::Cardinality {
                    before: edge.cardinality,
                    after: other.cardinality,
                },
            });
        }
    }
    for key in new_edges.keys() {
        if !old_edges.contains_key(key) {
            added.edges.push(key.clone());
        }
    }

    DiffResult {
        old_version: old.version(),
        new_version: new.version(),
        added,
        removed,
        changed,
    }
}

fn diff_table(
    old: &Table,
    new: &Table,
    added: &mut Delta,
    removed: &mut Delta,
    changed: &mut Vec<Change>,
) {
    let old_pk: Vec<String> = old.primary_key.iter().map(|c| c.key.clone()).collect();
    let new_pk: Vec<String> = new.primary_key.iter().map(|c| c.key.clone()).collect();
    if old_pk != new_pk {
        changed.push(Change {
            subject: ChangeSubject::Table(old.name.clone()),
            change: AttributeChange::PrimaryKey {
                before: old_pk,
                after: new_pk,
            },
        });
    }

    let old_columns: BTreeMap<&str, &Column> =
        old.columns.iter().map(|c| (c.name.key.as_str(), c)).collect();
    let new_columns: BTreeMap<&str, &Column> =
        new.columns.iter().map(|c| (c.name.key.as_str(), c)).collect();

    for (key, column) in &old_columns {
        let reference = ColumnRef::new(old.name.clone(), column.name.clone());
        let Some(other) = new_columns.get(key) else {
            removed.columns.push(reference);
            continue;
        };

        let before = ColumnTypeInfo::from(*column);
        let after = ColumnTypeInfo::from(*other);
        if before.data_type != after.data_type
            || !before.raw_type.eq_ignore_ascii_case(&after.raw_type)
        {
            changed.push(Change {
                subject: ChangeSubject::Column(reference.clone()),
                change: AttributeChange::ColumnType { before, after },
            });
        }
        if column.nullable != other.nullable {
            changed.push(Change {
                subject: ChangeSubject::Column(reference.clone()),
                change: AttributeChange::Nullable {
                    before: column.nullable,
                    after: other.nullable,
                },
            });
        }
        if column.ordinal != other.ordinal {
            changed.push(Change {
                subject: ChangeSubject::Column(reference),
                change: AttributeChange::Ordinal {
                    before: column.ordinal,
                    after: other.ordinal,
                },
            });
        }
    }
    for (key, column) in &new_columns {
        if !old_columns.contains_key(key) {
            added
                .columns
                .push(ColumnRef::new(new.name.clone(), column.name.clone()));
        }
    }
}
