use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::graph::{EdgeKind, SchemaGraph};

/// Validate internal consistency of a schema graph.
///
/// This checks:
/// - duplicate column names within a table
/// - primary key columns exist
/// - every edge endpoint table and column exists in the same graph
/// - declared edges carry confidence 1.0 and inferred ones lie in [0, 1]
///
/// Graphs produced by [`crate::build`] always pass; graphs loaded from a snapshot
/// file should be checked before use.
pub fn validate_graph(graph: &SchemaGraph) -> Result<()> {
    for table in graph.tables() {
        let mut columns = BTreeSet::new();
        for column in &table.columns {
            if !columns.insert(&column.name.key) {
                return Err(Error::InvalidGraph(format!(
                    "duplicate column name: {}.{}",
                    table.name, column.name
                )));
            }
        }

        for column in &table.primary_key {
            if !columns.contains(&column.key) {
                return Err(Error::InvalidGraph(format!(
                    "primary key column not found: {}.{}",
                    table.name, column
                )));
            }
        }
    }

    for edge in graph.edges() {
        let source = graph.table(&edge.source).ok_or_else(|| {
            Error::InvalidGraph(format!("edge source table not found: {}", edge.source))
        })?;
        let target = graph.table(&edge.target).ok_or_else(|| {
            Error::InvalidGraph(format!("edge target table not found: {}", edge.target))
        })?;

        if edge.source_columns.is_empty() || edge.source_columns.len() != edge.target_columns.len() {
            return Err(Error::InvalidGraph(format!(
                "edge column arity mismatch: {}",
                edge.key()
            )));
        }

        for column in &edge.source_columns {
            if !source.has_column(column) {
                return Err(Error::InvalidGraph(format!(
                    "edge source column not found: {}.{}",
                    edge.source, column
                )));
            }
        }
        for column in &edge.target_columns {
            if !target.has_column(column) {
                return Err(Error::InvalidGraph(format!(
                    "edge target column not found: {}.{}",
                    edge.target, column
                )));
            }
        }

        let confidence_ok = match edge.kind {
            EdgeKind::Declared => edge.confidence == 1.0,
            EdgeKind::Inferred => (0.0..=1.0).contains(&edge.confidence),
        };
        if !confidence_ok {
            return Err(Error::InvalidGraph(format!(
                "edge confidence out of range: {} ({})",
                edge.key(),
                edge.confidence
            )));
        }
    }

    Ok(())
}
