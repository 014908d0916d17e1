mod support;

use jsonschema::JSONSchema;
use schemalink_core::{SNAPSHOT_FORMAT_VERSION, SchemaGraph, validate_graph};
use schemars::schema_for;
use support::shop;

#[test]
fn snapshot_matches_generated_json_schema() {
    let graph = shop()
        .foreign_key("fk_orders_customer", "orders", &["customer_id"], "customers", &["id"])
        .graph();

    let schema = serde_json::to_value(schema_for!(SchemaGraph)).expect("serialize json schema");
    let compiled = JSONSchema::compile(&schema).expect("compile json schema");
    let snapshot = serde_json::to_value(&graph).expect("serialize snapshot");

    assert!(compiled.is_valid(&snapshot));
    assert_eq!(snapshot["format_version"], SNAPSHOT_FORMAT_VERSION);
}

#[test]
fn snapshot_round_trip_keeps_graph_valid() {
    let graph = shop().graph();
    let json = serde_json::to_string_pretty(&graph).expect("serialize snapshot");
    let loaded: SchemaGraph = serde_json::from_str(&json).expect("parse snapshot");

    validate_graph(&loaded).expect("loaded snapshot is valid");
    assert_eq!(loaded.version(), graph.version());
    assert_eq!(loaded.edges(), graph.edges());
    assert_eq!(loaded.lookup("orders").expect("orders").columns.len(), 3);
}

#[test]
fn reloaded_snapshots_stay_older_than_new_builds() {
    let first = shop().graph();
    let json = serde_json::to_string(&first).expect("serialize snapshot");
    let reloaded: SchemaGraph = serde_json::from_str(&json).expect("parse snapshot");

    let second = shop().graph();
    let third = shop().graph();
    assert!(second.version() > reloaded.version());
    assert!(third.version() > second.version());
}
