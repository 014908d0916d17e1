use async_trait::async_trait;

use schemalink_core::{Error, Identifier, QualifiedName, RawCatalog, RawForeignKeyRow, Result};

/// Trait implemented by catalogs that can describe their tables.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Returns the engine identifier (e.g. `postgres`).
    fn engine(&self) -> &'static str;

    /// Column and primary key rows of every visible table.
    async fn list_tables(&self) -> Result<RawCatalog>;

    /// One row per column pair of every declared foreign key.
    async fn list_declared_foreign_keys(&self) -> Result<Vec<RawForeignKeyRow>>;

    fn supports_sampling(&self) -> bool {
        false
    }

    /// Up to `limit` non-null values of `table.column`, rendered as text.
    async fn sample_column_values(
        &self,
        table: &QualifiedName,
        column: &Identifier,
        limit: u32,
    ) -> Result<Vec<String>> {
        let _ = (table, column, limit);
        Err(Error::Unsupported(format!(
            "{} does not support column sampling",
            self.engine()
        )))
    }
}
