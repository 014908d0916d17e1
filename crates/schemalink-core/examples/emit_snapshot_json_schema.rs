use schemalink_core::SchemaGraph;
use schemars::schema_for;

fn main() {
    let schema = schema_for!(SchemaGraph);
    let json = serde_json::to_string_pretty(&schema).expect("serialize snapshot json schema");
    println!("{json}");
}
