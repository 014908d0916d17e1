use thiserror::Error;

/// Core error type shared across schemalink crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A raw catalog row cannot be turned into a table definition.
    #[error("malformed metadata for {table}: {reason}")]
    MalformedMetadata { table: String, reason: String },
    /// The same qualified table name was defined twice with different contents.
    #[error("conflicting definitions for table {0}")]
    DuplicateTable(String),
    /// Some requested tables cannot be connected to the join root.
    #[error("no join path from {from} to {}", .unreachable.join(", "))]
    NoPath {
        from: String,
        unreachable: Vec<String>,
    },
    /// A table name that does not exist in the graph.
    #[error("unknown table: {0}")]
    UnknownTable(String),
    /// An unqualified table name that matches tables in several schemas.
    #[error("ambiguous table name {name}: matches {}", .candidates.join(", "))]
    AmbiguousTable {
        name: String,
        candidates: Vec<String>,
    },
    /// The caller asked for something the operation cannot answer.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The graph violates internal invariants.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),
    /// Database error or catalog source failure.
    #[error("database error: {0}")]
    Db(String),
    /// A requested capability is not available.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    pub(crate) fn malformed(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedMetadata {
            table: table.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias for results returned by schemalink crates.
pub type Result<T> = std::result::Result<T, Error>;
