use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;

use schemalink_core::{
    Error, FoldRule, Identifier, QualifiedName, RawCatalog, RawForeignKeyRow, Result,
};

use crate::source::CatalogSource;

/// Catalog held in memory, for tests and offline demos.
///
/// Samples are keyed by folded `table` (or `schema.table`) and column name. A delay
/// and per-column failures can be injected to exercise degraded sampling.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    catalog: RawCatalog,
    foreign_keys: Vec<RawForeignKeyRow>,
    fold: FoldRule,
    sampling: bool,
    samples: BTreeMap<(String, String), Vec<String>>,
    failing: BTreeSet<(String, String)>,
    delay: Option<Duration>,
}

impl MemorySource {
    pub fn new(catalog: RawCatalog, foreign_keys: Vec<RawForeignKeyRow>) -> Self {
        Self {
            catalog,
            foreign_keys,
            sampling: true,
            ..Self::default()
        }
    }

    /// Fold rule used to match sample keys against requested names.
    pub fn with_fold(mut self, fold: FoldRule) -> Self {
        self.fold = fold;
        self
    }

    pub fn with_samples<I, S>(mut self, table: &str, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = self.sample_key(table, column);
        self.samples
            .insert(key, values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_failing_column(mut self, table: &str, column: &str) -> Self {
        let key = self.sample_key(table, column);
        self.failing.insert(key);
        self
    }

    /// Sleep this long before answering any sample request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn without_sampling(mut self) -> Self {
        self.sampling = false;
        self
    }

    fn sample_key(&self, table: &str, column: &str) -> (String, String) {
        (
            QualifiedName::parse(table, self.fold).key(),
            self.fold.fold(column),
        )
    }
}

#[async_trait]
impl CatalogSource for MemorySource {
    fn engine(&self) -> &'static str {
        "memory"
    }

    async fn list_tables(&self) -> Result<RawCatalog> {
        Ok(self.catalog.clone())
    }

    async fn list_declared_foreign_keys(&self) -> Result<Vec<RawForeignKeyRow>> {
        Ok(self.foreign_keys.clone())
    }

    fn supports_sampling(&self) -> bool {
        self.sampling
    }

    async fn sample_column_values(
        &self,
        table: &QualifiedName,
        column: &Identifier,
        limit: u32,
    ) -> Result<Vec<String>> {
        if !self.sampling {
            return Err(Error::Unsupported("sampling disabled for this source".to_string()));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let key = (table.key(), column.key.clone());
        if self.failing.contains(&key) {
            return Err(Error::Db(format!("sampling {table}.{column} failed")));
        }

        Ok(self
            .samples
            .get(&key)
            .map(|values| values.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }
}
