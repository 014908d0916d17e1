#![allow(dead_code)]

use schemalink_core::{
    BuildOutput, ColumnRef, FoldRule, Identifier, InferenceConfig, NormalizePolicy,
    QualifiedName, RawCatalog, RawColumnRow, RawForeignKeyRow, RawPrimaryKeyRow, SampleSet,
    SchemaGraph, build, infer, normalize, normalize_foreign_keys,
};

/// Catalog rows assembled table by table, the way a catalog query would return them.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    raw: RawCatalog,
    foreign_keys: Vec<RawForeignKeyRow>,
}

fn split(name: &str) -> (Option<String>, String) {
    match name.split_once('.') {
        Some((schema, table)) => (Some(schema.to_string()), table.to_string()),
        None => (None, name.to_string()),
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// `columns` are `(name, type)` pairs; `name` may be `schema.table`.
    pub fn table(mut self, name: &str, columns: &[(&str, &str)], primary_key: &[&str]) -> Self {
        let (schema, table) = split(name);
        for (ordinal, (column, data_type)) in columns.iter().enumerate() {
            self.raw.columns.push(RawColumnRow {
                schema: schema.clone(),
                table: table.clone(),
                column: Some(column.to_string()),
                data_type: data_type.to_string(),
                nullable: !primary_key.contains(column),
                ordinal: Some(ordinal as i32 + 1),
            });
        }
        for (position, column) in primary_key.iter().enumerate() {
            self.raw.primary_keys.push(RawPrimaryKeyRow {
                schema: schema.clone(),
                table: table.clone(),
                column: column.to_string(),
                position: Some(position as i32 + 1),
            });
        }
        self
    }

    pub fn foreign_key(
        mut self,
        name: &str,
        table: &str,
        columns: &[&str],
        referenced_table: &str,
        referenced_columns: &[&str],
    ) -> Self {
        let (schema, table) = split(table);
        let (referenced_schema, referenced_table) = split(referenced_table);
        for (position, (column, referenced)) in columns.iter().zip(referenced_columns).enumerate() {
            self.foreign_keys.push(RawForeignKeyRow {
                constraint_name: Some(name.to_string()),
                schema: schema.clone(),
                table: table.clone(),
                column: Some(column.to_string()),
                referenced_schema: referenced_schema.clone(),
                referenced_table: referenced_table.clone(),
                referenced_column: Some(referenced.to_string()),
                position: Some(position as i32 + 1),
            });
        }
        self
    }

    pub fn reversed(mut self) -> Self {
        self.raw.columns.reverse();
        self.raw.primary_keys.reverse();
        self.foreign_keys.reverse();
        self
    }

    pub fn build(&self) -> BuildOutput {
        let policy = NormalizePolicy::default();
        let tables = normalize(&self.raw, &policy).expect("normalize catalog");
        let (foreign_keys, warnings) = normalize_foreign_keys(&self.foreign_keys, &policy);
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
        build(tables, foreign_keys, policy.fold).expect("build graph")
    }

    /// Built graph enriched with default inference and no samples.
    pub fn graph(&self) -> SchemaGraph {
        infer(self.build().graph, &InferenceConfig::default(), None).graph
    }

    pub fn graph_with_samples(&self, samples: &SampleSet) -> SchemaGraph {
        infer(self.build().graph, &InferenceConfig::default(), Some(samples)).graph
    }
}

pub fn column_ref(table: &str, column: &str) -> ColumnRef {
    let (schema, table) = split(table);
    ColumnRef::new(
        QualifiedName::new(schema.as_deref(), &table, FoldRule::Lower),
        Identifier::new(column, FoldRule::Lower),
    )
}

/// `orders(id, customer_id, total)` and `customers(id, name)` without declared keys.
pub fn shop() -> Catalog {
    Catalog::new()
        .table(
            "orders",
            &[("id", "integer"), ("customer_id", "integer"), ("total", "numeric(12,2)")],
            &["id"],
        )
        .table("customers", &[("id", "integer"), ("name", "text")], &["id"])
}
