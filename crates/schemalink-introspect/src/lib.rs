//! Catalog access and the discovery pipeline.
//!
//! A [`CatalogSource`] hands out raw catalog rows and, optionally, column samples.
//! [`discover`] drives a source through normalization, graph building, sampling and
//! relationship inference.

pub mod discover;
pub mod memory;
pub mod options;
pub mod postgres;
pub mod sampling;
pub mod source;

pub use discover::{discover, Discovery, DiscoveryStats};
pub use memory::MemorySource;
pub use options::{DiscoverOptions, SamplingOptions};
pub use postgres::PostgresSource;
pub use sampling::{sample_columns, SampleOutcome};
pub use source::CatalogSource;

pub use schemalink_core::SchemaGraph;
