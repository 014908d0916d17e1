use std::time::Duration;

use futures_util::stream::{self, StreamExt};

use schemalink_core::{ColumnRef, SampleSet, Warning, WarningCode};

use crate::options::SamplingOptions;
use crate::source::CatalogSource;

/// Samples that arrived in time plus a warning for every column that did not.
#[derive(Debug, Clone, Default)]
pub struct SampleOutcome {
    pub samples: SampleSet,
    pub warnings: Vec<Warning>,
}

/// Sample `columns` through `source`, at most `options.concurrency` at a time.
///
/// Sampling never fails: an unsupported source, an error or a timeout only costs the
/// affected columns their sampling evidence and is reported as a warning. Columns that
/// return no values are left out of the sample set. Results are
/// merged in column order, so completion order does not matter.
pub async fn sample_columns(
    source: &dyn CatalogSource,
    columns: &[ColumnRef],
    options: &SamplingOptions,
) -> SampleOutcome {
    let mut outcome = SampleOutcome::default();
    if !options.enabled || columns.is_empty() {
        return outcome;
    }
    if !source.supports_sampling() {
        outcome.warnings.push(Warning::new(
            WarningCode::SamplingUnsupported,
            source.engine(),
            "source does not support column sampling; scoring without samples",
        ));
        return outcome;
    }

    let timeout = Duration::from_millis(options.timeout_ms);
    let limit = options.limit;
    let tasks = columns.iter().cloned().map(|column| async move {
        let result = tokio::time::timeout(
            timeout,
            source.sample_column_values(&column.table, &column.column, limit),
        )
        .await;
        (column, result)
    });

    let mut results: Vec<_> = stream::iter(tasks)
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;
    results.sort_by(|left, right| left.0.cmp(&right.0));

    for (column, result) in results {
        match result {
            Ok(Ok(values)) if values.is_empty() => {
                tracing::debug!(event = "sample_empty", column = %column);
            }
            Ok(Ok(values)) => outcome.samples.insert(column, values),
            Ok(Err(err)) => {
                tracing::warn!(event = "sampling_failed", column = %column, error = %err);
                outcome.warnings.push(Warning::new(
                    WarningCode::SamplingFailed,
                    column.to_string(),
                    err.to_string(),
                ));
            }
            Err(_) => {
                tracing::warn!(
                    event = "sampling_timed_out",
                    column = %column,
                    timeout_ms = options.timeout_ms
                );
                outcome.warnings.push(Warning::new(
                    WarningCode::SamplingTimedOut,
                    column.to_string(),
                    format!("no sample within {} ms", options.timeout_ms),
                ));
            }
        }
    }

    tracing::debug!(
        event = "sampling_finished",
        requested = columns.len(),
        sampled = outcome.samples.len(),
        warnings = outcome.warnings.len()
    );
    outcome
}
