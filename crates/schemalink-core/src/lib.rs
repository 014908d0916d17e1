//! Core contracts and algorithms for Schemalink.
//!
//! This crate turns raw catalog rows into an immutable [`SchemaGraph`], enriches it
//! with inferred relationships, resolves join paths over it and renders them as SQL.
//! It performs no I/O; catalog access lives in `schemalink-introspect`.

pub mod builder;
pub mod diff;
pub mod error;
pub mod graph;
pub mod ident;
pub mod inference;
pub mod normalize;
pub mod render;
pub mod resolve;
pub mod schema;
pub mod summary;
pub mod types;
pub mod validation;
pub mod warning;

pub use builder::{build, BuildOutput};
pub use diff::{diff, AttributeChange, Change, ChangeSubject, ColumnTypeInfo, Delta, DiffResult};
pub use error::{Error, Result};
pub use graph::{
    Cardinality, EdgeKey, EdgeKind, RelationshipEdge, SchemaGraph, SnapshotVersion,
};
pub use ident::{FoldRule, Identifier, QualifiedName};
pub use inference::{
    infer, propose_candidates, sampling_requests, score_candidates, Candidate,
    InferenceConfig, InferenceOutput, InferenceStats, NameMatch, SampleSet, ScoredCandidate,
};
pub use normalize::{
    normalize, normalize_foreign_keys, NormalizePolicy, RawCatalog, RawColumnRow,
    RawForeignKeyRow, RawPrimaryKeyRow,
};
pub use render::{render, Dialect, JoinType, QuoteStyle};
pub use resolve::{resolve, JoinPath, JoinStep};
pub use schema::{Column, ColumnRef, ForeignKey, Table};
pub use summary::{summarize, GraphSummary};
pub use types::{DataType, TypeFamily};
pub use validation::validate_graph;
pub use warning::{Warning, WarningCode};

/// Current contract version for serialized `snapshot.json` artifacts.
pub const SNAPSHOT_FORMAT_VERSION: &str = "0.1";
