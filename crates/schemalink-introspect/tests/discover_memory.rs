use std::time::Duration;

use anyhow::Result;
use schemalink_core::{
    EdgeKind, Error, RawCatalog, RawColumnRow, RawForeignKeyRow, RawPrimaryKeyRow, WarningCode,
    diff,
};
use schemalink_introspect::{DiscoverOptions, MemorySource, SamplingOptions, discover};

fn column(table: &str, column: &str, data_type: &str, ordinal: i32) -> RawColumnRow {
    RawColumnRow {
        schema: Some("public".to_string()),
        table: table.to_string(),
        column: Some(column.to_string()),
        data_type: data_type.to_string(),
        nullable: true,
        ordinal: Some(ordinal),
    }
}

fn primary_key(table: &str, column: &str) -> RawPrimaryKeyRow {
    RawPrimaryKeyRow {
        schema: Some("public".to_string()),
        table: table.to_string(),
        column: column.to_string(),
        position: Some(1),
    }
}

fn shop_catalog() -> RawCatalog {
    RawCatalog {
        columns: vec![
            column("orders", "id", "integer", 1),
            column("orders", "customer_id", "integer", 2),
            column("customers", "id", "integer", 1),
            column("customers", "name", "character varying", 2),
        ],
        primary_keys: vec![primary_key("orders", "id"), primary_key("customers", "id")],
    }
}

fn shop_source() -> MemorySource {
    MemorySource::new(shop_catalog(), Vec::new())
        .with_samples("public.orders", "customer_id", ["1", "2", "2"])
        .with_samples("public.customers", "id", ["1", "2", "3"])
}

#[tokio::test]
async fn samples_raise_inferred_confidence() -> Result<()> {
    let discovery = discover(&shop_source(), &DiscoverOptions::default()).await?;

    assert!(discovery.warnings.is_empty(), "{:?}", discovery.warnings);
    assert_eq!(discovery.stats.sampled_columns, 2);
    assert_eq!(discovery.stats.inferred_edges, 1);

    let edge = discovery.graph.inferred_edges().next().expect("inferred edge");
    assert_eq!(edge.source.key(), "public.orders");
    assert_eq!(edge.target.key(), "public.customers");
    assert!((edge.confidence - 0.94).abs() < 1e-9);
    Ok(())
}

#[tokio::test]
async fn slow_sampling_degrades_to_warnings() -> Result<()> {
    let source = shop_source().with_delay(Duration::from_millis(250));
    let options = DiscoverOptions {
        sampling: SamplingOptions {
            timeout_ms: 10,
            ..SamplingOptions::default()
        },
        ..DiscoverOptions::default()
    };

    let discovery = discover(&source, &options).await?;

    assert_eq!(discovery.warnings.len(), 2);
    assert!(
        discovery
            .warnings
            .iter()
            .all(|warning| warning.code == WarningCode::SamplingTimedOut)
    );
    let edge = discovery.graph.inferred_edges().next().expect("inferred edge");
    assert!((edge.confidence - 0.79).abs() < 1e-9);
    Ok(())
}

#[tokio::test]
async fn failed_column_samples_are_reported() -> Result<()> {
    let source = shop_source().with_failing_column("public.customers", "id");
    let discovery = discover(&source, &DiscoverOptions::default()).await?;

    assert_eq!(discovery.warnings.len(), 1);
    assert_eq!(discovery.warnings[0].code, WarningCode::SamplingFailed);
    assert_eq!(discovery.warnings[0].subject, "public.customers.id");
    assert_eq!(discovery.stats.sampled_columns, 1);
    assert_eq!(discovery.stats.inferred_edges, 1);
    Ok(())
}

#[tokio::test]
async fn unsupported_sampling_is_a_single_warning() -> Result<()> {
    let source = shop_source().without_sampling();
    let discovery = discover(&source, &DiscoverOptions::default()).await?;

    assert_eq!(discovery.warnings.len(), 1);
    assert_eq!(discovery.warnings[0].code, WarningCode::SamplingUnsupported);
    assert_eq!(discovery.stats.inferred_edges, 1);
    Ok(())
}

#[tokio::test]
async fn stale_foreign_keys_do_not_fail_discovery() -> Result<()> {
    let stale = RawForeignKeyRow {
        constraint_name: Some("fk_orders_invoice".to_string()),
        schema: Some("public".to_string()),
        table: "orders".to_string(),
        column: Some("customer_id".to_string()),
        referenced_schema: Some("public".to_string()),
        referenced_table: "invoices".to_string(),
        referenced_column: Some("id".to_string()),
        position: Some(1),
    };
    let source = MemorySource::new(shop_catalog(), vec![stale]).without_sampling();
    let discovery = discover(&source, &DiscoverOptions::default()).await?;

    let codes: Vec<WarningCode> = discovery.warnings.iter().map(|warning| warning.code).collect();
    assert_eq!(
        codes,
        vec![WarningCode::DroppedForeignKey, WarningCode::SamplingUnsupported]
    );
    assert_eq!(discovery.graph.declared_edges().count(), 0);
    Ok(())
}

#[tokio::test]
async fn duplicate_columns_are_fatal() {
    let mut catalog = shop_catalog();
    catalog.columns.push(column("orders", "ID", "integer", 3));

    let err = discover(&MemorySource::new(catalog, Vec::new()), &DiscoverOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedMetadata { table, .. } if table == "public.orders"));
}

#[tokio::test]
async fn concurrent_snapshots_can_be_diffed() -> Result<()> {
    let mut grown = shop_catalog();
    grown.columns.push(column("invoices", "id", "integer", 1));
    grown.columns.push(column("invoices", "order_id", "integer", 2));
    grown.primary_keys.push(primary_key("invoices", "id"));

    let before_source = shop_source();
    let after_source = MemorySource::new(grown, Vec::new());
    let options = DiscoverOptions::default();

    let (before, after) = tokio::join!(
        discover(&before_source, &options),
        discover(&after_source, &options)
    );
    let (before, after) = (before?, after?);
    assert_ne!(before.graph.version(), after.graph.version());

    let result = diff(&before.graph, &after.graph);
    let added: Vec<String> = result.added.tables.iter().map(|table| table.key()).collect();
    assert_eq!(added, vec!["public.invoices"]);
    assert!(
        result
            .added
            .edges
            .iter()
            .all(|edge| edge.kind == EdgeKind::Inferred)
    );
    assert_eq!(result.added.edges.len(), 1);
    Ok(())
}

#[tokio::test]
async fn empty_samples_are_not_counted() -> Result<()> {
    let source = MemorySource::new(shop_catalog(), Vec::new())
        .with_samples("public.orders", "customer_id", ["1", "2"])
        .with_samples("public.customers", "id", Vec::<String>::new());
    let discovery = discover(&source, &DiscoverOptions::default()).await?;

    assert!(discovery.warnings.is_empty(), "{:?}", discovery.warnings);
    assert_eq!(discovery.stats.sampled_columns, 1);
    let edge = discovery.graph.inferred_edges().next().expect("inferred edge");
    assert!((edge.confidence - 0.79).abs() < 1e-9);
    Ok(())
}
