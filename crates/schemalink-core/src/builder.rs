use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::graph::{Cardinality, EdgeKind, RelationshipEdge, SchemaGraph};
use crate::ident::FoldRule;
use crate::schema::{ForeignKey, Table};
use crate::validation::validate_graph;
use crate::warning::{Warning, WarningCode};

/// A freshly built graph plus the soft problems met while building it.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub graph: SchemaGraph,
    pub warnings: Vec<Warning>,
}

/// Assemble normalized tables and declared foreign keys into a [`SchemaGraph`].
///
/// Identical duplicate table definitions collapse into one; conflicting ones fail with
/// [`Error::DuplicateTable`]. Foreign keys that point at missing tables or columns are
/// dropped and reported as warnings. When a key omits its referenced columns the target
/// primary key is used if the arity matches.
pub fn build(tables: Vec<Table>, foreign_keys: Vec<ForeignKey>, fold: FoldRule) -> Result<BuildOutput> {
    let mut catalog: BTreeMap<String, Table> = BTreeMap::new();

    for table in tables {
        let key = table.name.key();
        match catalog.get(&key) {
            Some(existing) if existing.same_definition(&table) => {
                tracing::debug!(event = "duplicate_table_collapsed", table = %table.name);
            }
            Some(_) => return Err(Error::DuplicateTable(table.name.to_string())),
            None => {
                let mut table = table;
                table.foreign_keys.clear();
                catalog.insert(key, table);
            }
        }
    }

    let mut foreign_keys = foreign_keys;
    foreign_keys.sort_by(|left, right| {
        left.source
            .key()
            .cmp(&right.source.key())
            .then_with(|| left.name.cmp(&right.name))
            .then_with(|| left.columns.cmp(&right.columns))
    });

    let mut warnings = Vec::new();
    let mut seen = BTreeSet::new();
    let mut edges = Vec::new();

    for fk in foreign_keys {
        let subject = format!("{}({})", fk.source, fk.name.as_deref().unwrap_or("unnamed"));
        let resolved = match resolve_foreign_key(&catalog, fk) {
            Ok(resolved) => resolved,
            Err(reason) => {
                tracing::warn!(event = "foreign_key_dropped", subject = %subject, reason = %reason);
                warnings.push(Warning::new(WarningCode::DroppedForeignKey, subject, reason));
                continue;
            }
        };

        let edge = declared_edge(&catalog, &resolved);
        if !seen.insert(edge.key()) {
            warnings.push(Warning::new(
                WarningCode::DuplicateForeignKey,
                subject,
                format!("foreign key already declared as {}", edge.key()),
            ));
            continue;
        }

        if let Some(source) = catalog.get_mut(&resolved.source.key()) {
            source.foreign_keys.push(resolved);
        }
        edges.push(edge);
    }

    let graph = SchemaGraph::new(fold, catalog, edges);
    validate_graph(&graph)?;

    tracing::debug!(
        event = "graph_built",
        version = %graph.version(),
        tables = graph.table_count(),
        edges = graph.edges().len(),
        warnings = warnings.len()
    );

    Ok(BuildOutput { graph, warnings })
}

fn resolve_foreign_key(
    catalog: &BTreeMap<String, Table>,
    mut fk: ForeignKey,
) -> std::result::Result<ForeignKey, String> {
    let source = catalog
        .get(&fk.source.key())
        .ok_or_else(|| format!("source table {} not found", fk.source))?;
    let target = catalog
        .get(&fk.target.key())
        .ok_or_else(|| format!("referenced table {} not found", fk.target))?;

    if fk.columns.is_empty() {
        return Err("foreign key without columns".to_string());
    }
    if let Some(missing) = fk.columns.iter().find(|column| !source.has_column(column)) {
        return Err(format!("column {}.{} not found", fk.source, missing));
    }

    if fk.target_columns.is_empty() {
        if target.primary_key.len() != fk.columns.len() {
            return Err(format!(
                "referenced columns omitted and {} has no matching primary key",
                fk.target
            ));
        }
        fk.target_columns = target.primary_key.clone();
    }

    if fk.target_columns.len() != fk.columns.len() {
        return Err(format!(
            "{} local columns but {} referenced columns",
            fk.columns.len(),
            fk.target_columns.len()
        ));
    }
    if let Some(missing) = fk.target_columns.iter().find(|column| !target.has_column(column)) {
        return Err(format!("referenced column {}.{} not found", fk.target, missing));
    }

    // Keep the catalog's display spelling of both endpoints.
    fk.source = source.name.clone();
    fk.target = target.name.clone();
    Ok(fk)
}

fn declared_edge(catalog: &BTreeMap<String, Table>, fk: &ForeignKey) -> RelationshipEdge {
    let targets_key = catalog
        .get(&fk.target.key())
        .is_some_and(|target| target.is_primary_key(&fk.target_columns));

    RelationshipEdge {
        name: fk.name.clone(),
        source: fk.source.clone(),
        source_columns: fk.columns.clone(),
        target: fk.target.clone(),
        target_columns: fk.target_columns.clone(),
        kind: EdgeKind::Declared,
        confidence: 1.0,
        cardinality: if targets_key {
            Cardinality::OneToMany
        } else {
            Cardinality::Unknown
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{Identifier, QualifiedName};
    use crate::schema::Column;
    use crate::types::DataType;

    fn ident(name: &str) -> Identifier {
        Identifier::new(name, FoldRule::Lower)
    }

    fn table(name: &str, columns: &[&str], pk: &[&str]) -> Table {
        Table {
            name: QualifiedName::new(None, name, FoldRule::Lower),
            columns: columns
                .iter()
                .enumerate()
                .map(|(idx, column)| Column {
                    name: ident(column),
                    data_type: DataType::Integer,
                    raw_type: "integer".to_string(),
                    nullable: false,
                    ordinal: idx as u32 + 1,
                })
                .collect(),
            primary_key: pk.iter().map(|column| ident(column)).collect(),
            foreign_keys: Vec::new(),
        }
    }

    fn fk(source: &str, columns: &[&str], target: &str, target_columns: &[&str]) -> ForeignKey {
        ForeignKey {
            name: Some(format!("fk_{source}_{target}")),
            source: QualifiedName::new(None, source, FoldRule::Lower),
            columns: columns.iter().map(|column| ident(column)).collect(),
            target: QualifiedName::new(None, target, FoldRule::Lower),
            target_columns: target_columns.iter().map(|column| ident(column)).collect(),
        }
    }

    #[test]
    fn declared_keys_become_declared_edges() {
        let output = build(
            vec![
                table("orders", &["id", "customer_id"], &["id"]),
                table("customers", &["id"], &["id"]),
            ],
            vec![fk("orders", &["customer_id"], "customers", &["id"])],
            FoldRule::Lower,
        )
        .expect("build");

        assert!(output.warnings.is_empty());
        let edges = output.graph.edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].kind, EdgeKind::Declared);
        assert_eq!(edges[0].confidence, 1.0);
        assert_eq!(edges[0].cardinality, Cardinality::OneToMany);

        let orders = output.graph.lookup("orders").expect("orders");
        assert_eq!(orders.foreign_keys.len(), 1);
    }

    #[test]
    fn conflicting_redefinition_fails() {
        let err = build(
            vec![
                table("orders", &["id"], &["id"]),
                table("orders", &["id", "total"], &["id"]),
            ],
            Vec::new(),
            FoldRule::Lower,
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateTable(name) if name == "orders"));
    }

    #[test]
    fn identical_redefinition_collapses() {
        let output = build(
            vec![table("orders", &["id"], &["id"]), table("orders", &["id"], &["id"])],
            Vec::new(),
            FoldRule::Lower,
        )
        .expect("build");
        assert_eq!(output.graph.table_count(), 1);
    }

    #[test]
    fn stale_foreign_keys_are_dropped_with_warnings() {
        let output = build(
            vec![table("orders", &["id", "customer_id"], &["id"])],
            vec![
                fk("orders", &["customer_id"], "customers", &["id"]),
                fk("orders", &["missing"], "orders", &["id"]),
            ],
            FoldRule::Lower,
        )
        .expect("build");

        assert!(output.graph.edges().is_empty());
        assert_eq!(output.warnings.len(), 2);
        assert!(
            output
                .warnings
                .iter()
                .all(|warning| warning.code == WarningCode::DroppedForeignKey)
        );
    }

    #[test]
    fn omitted_referenced_columns_fall_back_to_primary_key() {
        let output = build(
            vec![
                table("orders", &["id", "customer_id"], &["id"]),
                table("customers", &["id"], &["id"]),
            ],
            vec![fk("orders", &["customer_id"], "customers", &[])],
            FoldRule::Lower,
        )
        .expect("build");

        assert_eq!(output.graph.edges()[0].target_columns[0].key, "id");
    }

    #[test]
    fn duplicate_declarations_are_reported_once() {
        let output = build(
            vec![
                table("orders", &["id", "customer_id"], &["id"]),
                table("customers", &["id"], &["id"]),
            ],
            vec![
                fk("orders", &["customer_id"], "customers", &["id"]),
                fk("orders", &["customer_id"], "customers", &["id"]),
            ],
            FoldRule::Lower,
        )
        .expect("build");

        assert_eq!(output.graph.edges().len(), 1);
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(output.warnings[0].code, WarningCode::DuplicateForeignKey);
    }
}
