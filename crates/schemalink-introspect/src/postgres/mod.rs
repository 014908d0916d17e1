use async_trait::async_trait;
use sqlx::PgPool;

use schemalink_core::{Identifier, QualifiedName, RawCatalog, RawForeignKeyRow, Result};

use crate::source::CatalogSource;

mod mapper;
mod queries;

/// Catalog source for PostgreSQL databases.
#[derive(Debug, Clone)]
pub struct PostgresSource {
    pool: PgPool,
    schemas: Option<Vec<String>>,
}

impl PostgresSource {
    /// Create a new source using a pre-configured pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schemas: None,
        }
    }

    /// Only describe tables of these schemas. System schemas are always skipped
    /// unless listed explicitly.
    pub fn with_schemas(mut self, schemas: Vec<String>) -> Self {
        self.schemas = Some(schemas);
        self
    }
}

#[async_trait]
impl CatalogSource for PostgresSource {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    async fn list_tables(&self) -> Result<RawCatalog> {
        let allow = self.schemas.as_deref();
        let columns = queries::list_columns(&self.pool).await?;
        let primary_keys = queries::list_primary_keys(&self.pool).await?;

        let catalog = RawCatalog {
            columns: mapper::filter_columns(columns, allow),
            primary_keys: mapper::filter_primary_keys(primary_keys, allow),
        };
        tracing::debug!(
            event = "postgres_catalog_listed",
            columns = catalog.columns.len(),
            primary_key_columns = catalog.primary_keys.len()
        );
        Ok(catalog)
    }

    async fn list_declared_foreign_keys(&self) -> Result<Vec<RawForeignKeyRow>> {
        let rows = queries::list_foreign_keys(&self.pool).await?;
        Ok(mapper::filter_foreign_keys(rows, self.schemas.as_deref()))
    }

    fn supports_sampling(&self) -> bool {
        true
    }

    async fn sample_column_values(
        &self,
        table: &QualifiedName,
        column: &Identifier,
        limit: u32,
    ) -> Result<Vec<String>> {
        let sql = mapper::sample_query(table, column);
        queries::sample_values(&self.pool, &sql, limit).await
    }
}
