use std::time::Instant;

use serde::{Deserialize, Serialize};

use schemalink_core::{
    BuildOutput, InferenceOutput, InferenceStats, Result, SchemaGraph, Warning, build, infer,
    normalize, normalize_foreign_keys, propose_candidates, sampling_requests,
};

use crate::options::DiscoverOptions;
use crate::sampling::sample_columns;
use crate::source::CatalogSource;

/// Counters describing one discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryStats {
    pub tables: usize,
    pub declared_edges: usize,
    pub inferred_edges: usize,
    pub sampled_columns: usize,
    pub inference: InferenceStats,
    pub elapsed_ms: u64,
}

/// A discovered graph together with every non-fatal problem met on the way.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub graph: SchemaGraph,
    pub warnings: Vec<Warning>,
    pub stats: DiscoveryStats,
}

/// Read `source`, build its schema graph and enrich it with inferred relationships.
///
/// Fails only on catalog errors and fatal metadata problems. Dropped foreign keys and
/// degraded sampling end up in [`Discovery::warnings`], sorted.
pub async fn discover(source: &dyn CatalogSource, options: &DiscoverOptions) -> Result<Discovery> {
    let started = Instant::now();
    tracing::info!(event = "discover_start", engine = source.engine());

    let catalog = source.list_tables().await?;
    let foreign_key_rows = source.list_declared_foreign_keys().await?;

    let tables = normalize(&catalog, &options.normalize)?;
    let (foreign_keys, mut warnings) = normalize_foreign_keys(&foreign_key_rows, &options.normalize);
    let BuildOutput {
        graph,
        warnings: build_warnings,
    } = build(tables, foreign_keys, options.normalize.fold)?;
    warnings.extend(build_warnings);

    let samples = if options.inference.enabled && options.sampling.enabled {
        let candidates = propose_candidates(&graph, &options.inference);
        let requests = sampling_requests(&candidates);
        let outcome = sample_columns(source, &requests, &options.sampling).await;
        warnings.extend(outcome.warnings);
        Some(outcome.samples)
    } else {
        None
    };

    let InferenceOutput {
        graph,
        stats: inference,
    } = infer(graph, &options.inference, samples.as_ref());
    warnings.sort();

    let stats = DiscoveryStats {
        tables: graph.table_count(),
        declared_edges: graph.declared_edges().count(),
        inferred_edges: graph.inferred_edges().count(),
        sampled_columns: samples.as_ref().map_or(0, |samples| samples.len()),
        inference,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    tracing::info!(
        event = "discover_complete",
        engine = source.engine(),
        version = %graph.version(),
        tables = stats.tables,
        declared_edges = stats.declared_edges,
        inferred_edges = stats.inferred_edges,
        warnings = warnings.len(),
        elapsed_ms = stats.elapsed_ms
    );

    Ok(Discovery {
        graph,
        warnings,
        stats,
    })
}
