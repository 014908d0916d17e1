use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::graph::{SchemaGraph, SnapshotVersion};

/// Counts and structural facts about a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GraphSummary {
    pub version: SnapshotVersion,
    pub tables: usize,
    pub columns: usize,
    pub declared_edges: usize,
    pub inferred_edges: usize,
    /// Tables without any edge to another table.
    pub isolated_tables: Vec<String>,
    pub tables_without_primary_key: Vec<String>,
    /// Referenced tables before referencing ones, following declared edges only.
    pub load_order: Option<Vec<String>>,
    /// Tables blocked by a declared cycle when no load order exists.
    pub cycle: Option<Vec<String>>,
}

/// Summarize `graph`. Deterministic for a given graph.
pub fn summarize(graph: &SchemaGraph) -> GraphSummary {
    let isolated_tables = graph
        .tables()
        .filter(|table| graph.neighbors(&table.name).is_empty())
        .map(|table| table.name.to_string())
        .collect();
    let tables_without_primary_key = graph
        .tables()
        .filter(|table| table.primary_key.is_empty())
        .map(|table| table.name.to_string())
        .collect();

    let (load_order, cycle) = match toposort(&declared_dependencies(graph)) {
        Ok(order) => (Some(order), None),
        Err(cycle) => (None, Some(cycle)),
    };

    GraphSummary {
        version: graph.version(),
        tables: graph.table_count(),
        columns: graph.tables().map(|table| table.columns.len()).sum(),
        declared_edges: graph.declared_edges().count(),
        inferred_edges: graph.inferred_edges().count(),
        isolated_tables,
        tables_without_primary_key,
        load_order,
        cycle,
    }
}

// referenced table -> tables referencing it. Self-references never block loading.
fn declared_dependencies(graph: &SchemaGraph) -> BTreeMap<String, BTreeSet<String>> {
    let mut dependencies: BTreeMap<String, BTreeSet<String>> = graph
        .tables()
        .map(|table| (table.name.to_string(), BTreeSet::new()))
        .collect();

    for edge in graph.declared_edges() {
        if edge.is_self_reference() {
            continue;
        }
        dependencies
            .entry(edge.target.to_string())
            .or_default()
            .insert(edge.source.to_string());
    }

    dependencies
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<&str, usize> = graph.keys().map(|node| (node.as_str(), 0)).collect();
    for dependents in graph.values() {
        for dependent in dependents {
            *indegree.entry(dependent.as_str()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<&str> = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(node, _)| *node)
        .collect();
    let mut order = Vec::with_capacity(indegree.len());

    while let Some(node) = ready.pop_first() {
        order.push(node.to_string());
        let Some(dependents) = graph.get(node) else {
            continue;
        };
        for dependent in dependents {
            if let Some(count) = indegree.get_mut(dependent.as_str()) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    ready.insert(dependent.as_str());
                }
            }
        }
    }

    if order.len() == indegree.len() {
        Ok(order)
    } else {
        Err(indegree
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(node, _)| node.to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dependencies(pairs: &[(&str, &str)]) -> BTreeMap<String, BTreeSet<String>> {
        let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (referenced, referencing) in pairs {
            graph.entry(referencing.to_string()).or_default();
            graph
                .entry(referenced.to_string())
                .or_default()
                .insert(referencing.to_string());
        }
        graph
    }

    #[test]
    fn toposort_orders_referenced_tables_first() {
        let order = toposort(&dependencies(&[
            ("customers", "orders"),
            ("orders", "order_items"),
            ("products", "order_items"),
        ]))
        .expect("acyclic");

        let position = |name: &str| order.iter().position(|item| item == name).unwrap();
        assert!(position("customers") < position("orders"));
        assert!(position("orders") < position("order_items"));
        assert!(position("products") < position("order_items"));
    }

    #[test]
    fn toposort_reports_cycle_members() {
        let cycle = toposort(&dependencies(&[("a", "b"), ("b", "a"), ("a", "c")])).unwrap_err();
        assert_eq!(cycle, vec!["a", "b", "c"]);
    }
}
