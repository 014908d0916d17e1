use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::SNAPSHOT_FORMAT_VERSION;
use crate::error::{Error, Result};
use crate::ident::{FoldRule, Identifier, QualifiedName};
use crate::schema::Table;

/// Where a relationship edge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Declared,
    Inferred,
}

/// Cardinality hint for an edge, read from source to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// Many source rows reference one target row.
    OneToMany,
    ManyToMany,
    Unknown,
}

/// A directed relationship from source column(s) to target column(s).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RelationshipEdge {
    /// Constraint name for declared edges.
    pub name: Option<String>,
    pub source: QualifiedName,
    pub source_columns: Vec<Identifier>,
    pub target: QualifiedName,
    pub target_columns: Vec<Identifier>,
    pub kind: EdgeKind,
    /// 1.0 for declared edges, the inference score otherwise.
    pub confidence: f64,
    pub cardinality: Cardinality,
}

impl RelationshipEdge {
    /// Identity used for de-duplication and diffing.
    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source.key(),
            source_columns: self.source_columns.iter().map(|c| c.key.clone()).collect(),
            target: self.target.key(),
            target_columns: self.target_columns.iter().map(|c| c.key.clone()).collect(),
            kind: self.kind,
        }
    }

    pub fn is_self_reference(&self) -> bool {
        self.source == self.target
    }

    pub fn touches(&self, table: &QualifiedName) -> bool {
        &self.source == table || &self.target == table
    }

    /// The table on the other end, treating the edge as undirected.
    pub fn other_end(&self, table: &QualifiedName) -> Option<&QualifiedName> {
        if &self.source == table {
            Some(&self.target)
        } else if &self.target == table {
            Some(&self.source)
        } else {
            None
        }
    }

    /// Column lists as `(columns on `from`, columns on the other end)`.
    pub fn columns_from(&self, from: &QualifiedName) -> (&[Identifier], &[Identifier]) {
        if &self.source == from {
            (&self.source_columns, &self.target_columns)
        } else {
            (&self.target_columns, &self.source_columns)
        }
    }

    /// Same endpoints and columns regardless of kind or direction.
    pub fn links_same_columns(&self, other: &RelationshipEdge) -> bool {
        let forward = self.source == other.source
            && self.target == other.target
            && self.source_columns == other.source_columns
            && self.target_columns == other.target_columns;
        let backward = self.source == other.target
            && self.target == other.source
            && self.source_columns == other.target_columns
            && self.target_columns == other.source_columns;
        forward || backward
    }
}

/// Folded identity of an edge: endpoints, columns and kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct EdgeKey {
    pub source: String,
    pub source_columns: Vec<String>,
    pub target: String,
    pub target_columns: Vec<String>,
    pub kind: EdgeKind,
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            EdgeKind::Declared => "declared",
            EdgeKind::Inferred => "inferred",
        };
        write!(
            f,
            "{}({}) -> {}({}) [{kind}]",
            self.source,
            self.source_columns.join(", "),
            self.target,
            self.target_columns.join(", ")
        )
    }
}

static LAST_VERSION: AtomicU64 = AtomicU64::new(0);

/// Monotonically increasing snapshot identifier.
///
/// Versions are UTC microseconds since the epoch, bumped past the previous version
/// handed out in this process, so snapshots written by successive runs keep
/// increasing as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SnapshotVersion(pub u64);

impl SnapshotVersion {
    pub fn next() -> Self {
        let now = u64::try_from(Utc::now().timestamp_micros()).unwrap_or(0);
        let previous = LAST_VERSION
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        SnapshotVersion(now.max(previous + 1))
    }
}

impl fmt::Display for SnapshotVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Immutable snapshot of tables and the relationships between them.
///
/// Graphs are produced by [`crate::build`] and enriched by [`crate::infer`]; after
/// that every consumer only reads them.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SchemaGraph {
    format_version: String,
    version: SnapshotVersion,
    fold: FoldRule,
    tables: BTreeMap<String, Table>,
    edges: Vec<RelationshipEdge>,
}

impl SchemaGraph {
    pub(crate) fn new(
        fold: FoldRule,
        tables: BTreeMap<String, Table>,
        edges: Vec<RelationshipEdge>,
    ) -> Self {
        let mut graph = Self {
            format_version: SNAPSHOT_FORMAT_VERSION.to_string(),
            version: SnapshotVersion::next(),
            fold,
            tables,
            edges,
        };
        graph.sort_edges();
        graph
    }

    /// Consume the graph and return it with `edges` appended.
    pub(crate) fn with_edges(mut self, edges: Vec<RelationshipEdge>) -> Self {
        self.edges.extend(edges);
        self.sort_edges();
        self
    }

    fn sort_edges(&mut self) {
        self.edges.sort_by(|left, right| left.key().cmp(&right.key()));
    }

    pub fn format_version(&self) -> &str {
        &self.format_version
    }

    pub fn version(&self) -> SnapshotVersion {
        self.version
    }

    pub fn fold(&self) -> FoldRule {
        self.fold
    }

    /// Tables ordered by folded qualified name.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn table(&self, name: &QualifiedName) -> Option<&Table> {
        self.tables.get(&name.key())
    }

    pub fn table_by_key(&self, key: &str) -> Option<&Table> {
        self.tables.get(key)
    }

    /// Look a table up by user-supplied name, `schema.table` or bare `table`.
    ///
    /// A bare name matches a table in any schema as long as exactly one does.
    pub fn lookup(&self, name: &str) -> Result<&Table> {
        let parsed = QualifiedName::parse(name.trim(), self.fold);
        if let Some(table) = self.table(&parsed) {
            return Ok(table);
        }
        if parsed.schema.is_some() {
            return Err(Error::UnknownTable(name.to_string()));
        }

        let matches: Vec<&Table> = self
            .tables
            .values()
            .filter(|table| table.name.name == parsed.name)
            .collect();
        match matches.as_slice() {
            [] => Err(Error::UnknownTable(name.to_string())),
            [table] => Ok(table),
            many => Err(Error::AmbiguousTable {
                name: name.to_string(),
                candidates: many.iter().map(|table| table.name.to_string()).collect(),
            }),
        }
    }

    /// All edges, sorted by [`EdgeKey`].
    pub fn edges(&self) -> &[RelationshipEdge] {
        &self.edges
    }

    pub fn declared_edges(&self) -> impl Iterator<Item = &RelationshipEdge> {
        self.edges.iter().filter(|edge| edge.kind == EdgeKind::Declared)
    }

    pub fn inferred_edges(&self) -> impl Iterator<Item = &RelationshipEdge> {
        self.edges.iter().filter(|edge| edge.kind == EdgeKind::Inferred)
    }

    pub fn edges_touching<'a>(
        &'a self,
        table: &'a QualifiedName,
    ) -> impl Iterator<Item = &'a RelationshipEdge> + 'a {
        self.edges.iter().filter(move |edge| edge.touches(table))
    }

    /// Tables sharing at least one edge with `table`, excluding itself.
    pub fn neighbors<'a>(&'a self, table: &'a QualifiedName) -> BTreeSet<&'a QualifiedName> {
        self.edges_touching(table)
            .filter_map(|edge| edge.other_end(table))
            .filter(|other| *other != table)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use crate::types::DataType;

    fn table(schema: &str, name: &str) -> Table {
        Table {
            name: QualifiedName::new(Some(schema), name, FoldRule::Lower),
            columns: vec![Column {
                name: Identifier::new("id", FoldRule::Lower),
                data_type: DataType::Integer,
                raw_type: "int".to_string(),
                nullable: false,
                ordinal: 1,
            }],
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    fn graph(tables: Vec<Table>) -> SchemaGraph {
        let tables = tables
            .into_iter()
            .map(|table| (table.name.key(), table))
            .collect();
        SchemaGraph::new(FoldRule::Lower, tables, Vec::new())
    }

    #[test]
    fn versions_increase_between_graphs() {
        let first = graph(Vec::new());
        let second = graph(Vec::new());
        assert!(second.version() > first.version());
    }

    #[test]
    fn versions_follow_the_wall_clock() {
        let before = Utc::now().timestamp_micros() as u64;
        let version = graph(Vec::new()).version();
        assert!(version.0 >= before, "{version} predates {before}");
    }

    #[test]
    fn neighbors_skip_self_references() {
        let orders = table("sales", "orders");
        let customers = table("sales", "customers");
        let edge = |source: &Table, target: &Table| RelationshipEdge {
            name: None,
            source: source.name.clone(),
            source_columns: vec![Identifier::new("id", FoldRule::Lower)],
            target: target.name.clone(),
            target_columns: vec![Identifier::new("id", FoldRule::Lower)],
            kind: EdgeKind::Declared,
            confidence: 1.0,
            cardinality: Cardinality::Unknown,
        };
        let edges = vec![edge(&orders, &customers), edge(&orders, &orders)];
        let name = orders.name.clone();
        let graph = SchemaGraph::new(
            FoldRule::Lower,
            [orders, customers]
                .into_iter()
                .map(|table| (table.name.key(), table))
                .collect(),
            edges,
        );

        let neighbors: Vec<String> = graph.neighbors(&name).iter().map(|n| n.key()).collect();
        assert_eq!(neighbors, vec!["sales.customers"]);
    }

    #[test]
    fn lookup_resolves_bare_and_qualified_names() {
        let graph = graph(vec![table("sales", "Orders"), table("sales", "customers")]);
        assert_eq!(graph.lookup("ORDERS").unwrap().name.key(), "sales.orders");
        assert_eq!(graph.lookup("sales.customers").unwrap().name.key(), "sales.customers");
        assert!(matches!(graph.lookup("hr.orders"), Err(Error::UnknownTable(_))));
    }

    #[test]
    fn lookup_reports_ambiguous_bare_names() {
        let graph = graph(vec![table("sales", "users"), table("hr", "users")]);
        match graph.lookup("users") {
            Err(Error::AmbiguousTable { candidates, .. }) => {
                assert_eq!(candidates, vec!["hr.users", "sales.users"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }
}
