use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::{EdgeKind, RelationshipEdge, SchemaGraph};
use crate::ident::QualifiedName;

/// One join: `to` is attached to the already joined `from` through `edge`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinStep {
    pub from: QualifiedName,
    pub edge: RelationshipEdge,
    pub to: QualifiedName,
}

/// A spanning tree over the requested tables, rooted at the first one.
///
/// Steps are ordered so that each step's `from` is the root or the `to` of an
/// earlier step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinPath {
    pub root: QualifiedName,
    pub steps: Vec<JoinStep>,
}

impl JoinPath {
    /// Tables in join order. A self-join lists its table twice.
    pub fn tables(&self) -> Vec<&QualifiedName> {
        std::iter::once(&self.root)
            .chain(self.steps.iter().map(|step| &step.to))
            .collect()
    }
}

// (hops, inferred edges, summed confidence deficit in millionths)
type Cost = (u32, u32, u64);

fn edge_cost(edge: &RelationshipEdge) -> Cost {
    let inferred = u32::from(edge.kind == EdgeKind::Inferred);
    let deficit = ((1.0 - edge.confidence).clamp(0.0, 1.0) * 1_000_000.0).round() as u64;
    (1, inferred, deficit)
}

fn add(left: Cost, right: Cost) -> Cost {
    (left.0 + right.0, left.1 + right.1, left.2 + right.2)
}

// Declared before inferred, then higher confidence, then edge key.
fn edge_preference(left: &RelationshipEdge, right: &RelationshipEdge) -> std::cmp::Ordering {
    left.kind
        .cmp(&right.kind)
        .then_with(|| right.confidence.total_cmp(&left.confidence))
        .then_with(|| left.key().cmp(&right.key()))
}

/// Find the join tree connecting `requested` tables.
///
/// Edges are treated as undirected. Shorter paths win; among equally short ones
/// declared edges beat inferred ones, then higher confidence wins, then table names
/// decide. For three or more tables the tree grows from everything already connected
/// towards the nearest remaining table, so shared intermediate tables are joined once.
///
/// Naming a table twice asks for a self-join through its best self-referencing edge.
/// Fails with [`Error::NoPath`] naming every table that cannot be connected.
pub fn resolve<S: AsRef<str>>(graph: &SchemaGraph, requested: &[S]) -> Result<JoinPath> {
    if requested.len() < 2 {
        return Err(Error::InvalidRequest(
            "a join needs at least two tables".to_string(),
        ));
    }

    let mut order: Vec<QualifiedName> = Vec::new();
    let mut self_joins: Vec<QualifiedName> = Vec::new();
    for name in requested {
        let table = graph.lookup(name.as_ref())?.name.clone();
        if !order.contains(&table) {
            order.push(table);
        } else if !self_joins.contains(&table) {
            self_joins.push(table);
        } else {
            return Err(Error::InvalidRequest(format!(
                "table {table} requested more than twice"
            )));
        }
    }

    let root = order[0].clone();
    let mut steps = connect(graph, &root, &order[1..])?;

    for table in self_joins {
        let edge = graph
            .edges_touching(&table)
            .filter(|edge| edge.is_self_reference())
            .min_by(|left, right| edge_preference(left, right))
            .ok_or_else(|| Error::NoPath {
                from: table.to_string(),
                unreachable: vec![table.to_string()],
            })?;
        steps.push(JoinStep {
            from: table.clone(),
            edge: edge.clone(),
            to: table,
        });
    }

    Ok(JoinPath { root, steps })
}

fn connect(
    graph: &SchemaGraph,
    root: &QualifiedName,
    terminals: &[QualifiedName],
) -> Result<Vec<JoinStep>> {
    let mut adjacency: BTreeMap<String, Vec<(&RelationshipEdge, String)>> = BTreeMap::new();
    let mut ranked: Vec<&RelationshipEdge> = graph
        .edges()
        .iter()
        .filter(|edge| !edge.is_self_reference())
        .collect();
    ranked.sort_by(|left, right| edge_preference(left, right));
    for edge in ranked {
        let (source, target) = (edge.source.key(), edge.target.key());
        adjacency.entry(source.clone()).or_default().push((edge, target.clone()));
        adjacency.entry(target).or_default().push((edge, source));
    }

    let mut connected: BTreeSet<String> = BTreeSet::from([root.key()]);
    let mut steps = Vec::new();

    loop {
        let remaining: Vec<&QualifiedName> = terminals
            .iter()
            .filter(|table| !connected.contains(&table.key()))
            .collect();
        if remaining.is_empty() {
            return Ok(steps);
        }

        let (cost, predecessor) = shortest_paths(&adjacency, &connected);
        let next = remaining
            .iter()
            .filter_map(|table| cost.get(&table.key()).map(|cost| (*cost, table.key())))
            .min();

        let Some((_, target)) = next else {
            let mut unreachable: Vec<String> =
                remaining.iter().map(|table| table.to_string()).collect();
            unreachable.sort();
            return Err(Error::NoPath {
                from: root.to_string(),
                unreachable,
            });
        };

        let mut branch = Vec::new();
        let mut current = target;
        while !connected.contains(&current) {
            let Some((previous, edge)) = predecessor.get(&current) else {
                break;
            };
            branch.push(((*previous).clone(), *edge, current.clone()));
            current = (*previous).clone();
        }

        for (from, edge, to) in branch.into_iter().rev() {
            let (from_name, to_name) = endpoints(graph, edge, &from, &to);
            steps.push(JoinStep {
                from: from_name,
                edge: edge.clone(),
                to: to_name,
            });
            connected.insert(to);
        }
    }
}

fn endpoints(
    graph: &SchemaGraph,
    edge: &RelationshipEdge,
    from: &str,
    to: &str,
) -> (QualifiedName, QualifiedName) {
    let name = |key: &str| {
        graph
            .table_by_key(key)
            .map(|table| table.name.clone())
            .unwrap_or_else(|| {
                if edge.source.key() == key {
                    edge.source.clone()
                } else {
                    edge.target.clone()
                }
            })
    };
    (name(from), name(to))
}

type Predecessors<'a> = BTreeMap<String, (&'a String, &'a RelationshipEdge)>;

// Multi-source Dijkstra from every connected table. Ties settle in table-key order.
fn shortest_paths<'a>(
    adjacency: &'a BTreeMap<String, Vec<(&'a RelationshipEdge, String)>>,
    sources: &BTreeSet<String>,
) -> (BTreeMap<String, Cost>, Predecessors<'a>) {
    let mut cost: BTreeMap<String, Cost> = BTreeMap::new();
    let mut predecessor: Predecessors<'a> = BTreeMap::new();
    let mut heap = BinaryHeap::new();

    for source in sources {
        cost.insert(source.clone(), (0, 0, 0));
        heap.push(Reverse(((0, 0, 0), source.clone())));
    }

    while let Some(Reverse((current_cost, node))) = heap.pop() {
        if cost.get(&node).is_some_and(|best| *best < current_cost) {
            continue;
        }
        let Some((node_key, neighbors)) = adjacency.get_key_value(&node) else {
            continue;
        };
        for (edge, neighbor) in neighbors {
            let candidate = add(current_cost, edge_cost(edge));
            let improves = cost.get(neighbor).is_none_or(|best| candidate < *best);
            if improves {
                cost.insert(neighbor.clone(), candidate);
                predecessor.insert(neighbor.clone(), (node_key, *edge));
                heap.push(Reverse((candidate, neighbor.clone())));
            }
        }
    }

    (cost, predecessor)
}
