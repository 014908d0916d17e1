//! Turn raw catalog rows into uniform [`Table`] and [`ForeignKey`] values.
//!
//! Dialect quirks are handled here and nowhere else: quoted identifiers are
//! unquoted, names are folded with the configured [`FoldRule`], synonym schemas are
//! mapped onto their canonical name and rows without a schema get the default one.

use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ident::{FoldRule, Identifier, QualifiedName};
use crate::schema::{Column, ForeignKey, Table};
use crate::types::DataType;
use crate::warning::{Warning, WarningCode};

/// One column row as returned by a catalog query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawColumnRow {
    pub schema: Option<String>,
    pub table: String,
    pub column: Option<String>,
    pub data_type: String,
    pub nullable: bool,
    pub ordinal: Option<i32>,
}

/// One primary key column row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPrimaryKeyRow {
    pub schema: Option<String>,
    pub table: String,
    pub column: String,
    pub position: Option<i32>,
}

/// One column pair of a declared foreign key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawForeignKeyRow {
    pub constraint_name: Option<String>,
    pub schema: Option<String>,
    pub table: String,
    pub column: Option<String>,
    pub referenced_schema: Option<String>,
    pub referenced_table: String,
    pub referenced_column: Option<String>,
    pub position: Option<i32>,
}

/// Raw table/column metadata for a whole catalog snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCatalog {
    pub columns: Vec<RawColumnRow>,
    pub primary_keys: Vec<RawPrimaryKeyRow>,
}

/// Dialect policy applied while normalizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct NormalizePolicy {
    pub fold: FoldRule,
    /// Schema assigned to rows that carry none.
    pub default_schema: Option<String>,
    /// Alias schema name -> canonical schema name.
    pub schema_synonyms: BTreeMap<String, String>,
    /// Strip `"..."`, `` `...` `` and `[...]` around identifiers.
    pub unquote: bool,
}

impl Default for NormalizePolicy {
    fn default() -> Self {
        Self {
            fold: FoldRule::Lower,
            default_schema: None,
            schema_synonyms: BTreeMap::new(),
            unquote: true,
        }
    }
}

impl NormalizePolicy {
    fn identifier(&self, raw: &str) -> Option<Identifier> {
        let cleaned = unquote(raw, self.unquote);
        if cleaned.is_empty() {
            None
        } else {
            Some(Identifier::new(cleaned, self.fold))
        }
    }

    fn schema(&self, raw: Option<&str>) -> Option<Identifier> {
        let schema = raw
            .and_then(|schema| self.identifier(schema))
            .or_else(|| {
                self.default_schema
                    .as_deref()
                    .and_then(|schema| self.identifier(schema))
            })?;

        let canonical = self
            .schema_synonyms
            .iter()
            .find(|(alias, _)| self.fold.fold(alias) == schema.key)
            .and_then(|(_, canonical)| self.identifier(canonical));
        Some(canonical.unwrap_or(schema))
    }

    fn table_name(&self, schema: Option<&str>, table: &str) -> Result<QualifiedName> {
        let name = self.identifier(table).ok_or_else(|| {
            Error::malformed(
                format!("{}.<unnamed>", schema.unwrap_or_default()),
                "row without a table name",
            )
        })?;
        Ok(QualifiedName {
            schema: self.schema(schema),
            name,
        })
    }
}

fn unquote(raw: &str, enabled: bool) -> String {
    let trimmed = raw.trim();
    if !enabled || trimmed.len() < 2 {
        return trimmed.to_string();
    }

    let pairs = [('"', '"'), ('`', '`'), ('[', ']')];
    for (open, close) in pairs {
        if trimmed.starts_with(open) && trimmed.ends_with(close) {
            let inner = &trimmed[open.len_utf8()..trimmed.len() - close.len_utf8()];
            let doubled = format!("{close}{close}");
            return inner.replace(&doubled, &close.to_string());
        }
    }
    trimmed.to_string()
}

struct TableDraft {
    name: QualifiedName,
    columns: Vec<(i64, usize, Column)>,
    primary_key: Vec<(i64, usize, Identifier)>,
}

/// Normalize raw catalog rows into tables sorted by qualified name.
///
/// Fails with [`Error::MalformedMetadata`] when a column row has no name, a table
/// lists the same column twice, or a primary key row points outside its table.
/// Unmappable type strings become [`DataType::Unknown`].
pub fn normalize(raw: &RawCatalog, policy: &NormalizePolicy) -> Result<Vec<Table>> {
    let mut drafts: BTreeMap<String, TableDraft> = BTreeMap::new();

    for (index, row) in raw.columns.iter().enumerate() {
        let table_name = policy.table_name(row.schema.as_deref(), &row.table)?;
        let column_name = row
            .column
            .as_deref()
            .and_then(|column| policy.identifier(column))
            .ok_or_else(|| Error::malformed(table_name.to_string(), "column row without a name"))?;

        let draft = drafts
            .entry(table_name.key())
            .or_insert_with(|| TableDraft {
                name: table_name.clone(),
                columns: Vec::new(),
                primary_key: Vec::new(),
            });

        if draft.columns.iter().any(|(_, _, column)| column.name == column_name) {
            return Err(Error::malformed(
                table_name.to_string(),
                format!("duplicate column {column_name}"),
            ));
        }

        let column = Column {
            data_type: DataType::from_catalog(&row.data_type),
            raw_type: row.data_type.trim().to_string(),
            nullable: row.nullable,
            ordinal: 0,
            name: column_name,
        };
        draft
            .columns
            .push((row.ordinal.map(i64::from).unwrap_or(i64::MAX), index, column));
    }

    for (index, row) in raw.primary_keys.iter().enumerate() {
        let table_name = policy.table_name(row.schema.as_deref(), &row.table)?;
        let draft = drafts.get_mut(&table_name.key()).ok_or_else(|| {
            Error::malformed(
                table_name.to_string(),
                "primary key references a table without columns",
            )
        })?;
        let column = policy.identifier(&row.column).ok_or_else(|| {
            Error::malformed(table_name.to_string(), "primary key row without a column name")
        })?;
        if !draft.columns.iter().any(|(_, _, existing)| existing.name == column) {
            return Err(Error::malformed(
                table_name.to_string(),
                format!("primary key column {column} is not a column of the table"),
            ));
        }
        if draft.primary_key.iter().any(|(_, _, existing)| existing == &column) {
            continue;
        }
        draft
            .primary_key
            .push((row.position.map(i64::from).unwrap_or(i64::MAX), index, column));
    }

    Ok(drafts.into_values().map(finish_table).collect())
}

fn finish_table(mut draft: TableDraft) -> Table {
    draft.columns.sort_by_key(|(ordinal, index, _)| (*ordinal, *index));
    draft.primary_key.sort_by_key(|(position, index, _)| (*position, *index));

    // Catalog ordinals are kept only when every column has a distinct positive one;
    // otherwise the whole table is numbered by position.
    let mut seen = BTreeSet::new();
    let keep_ordinals = draft.columns.iter().all(|(ordinal, _, _)| {
        u32::try_from(*ordinal).is_ok_and(|ordinal| ordinal > 0) && seen.insert(*ordinal)
    });

    let columns = draft
        .columns
        .into_iter()
        .enumerate()
        .map(|(position, (ordinal, _, mut column))| {
            column.ordinal = match u32::try_from(ordinal) {
                Ok(ordinal) if keep_ordinals => ordinal,
                _ => position as u32 + 1,
            };
            column
        })
        .collect();

    Table {
        name: draft.name,
        columns,
        primary_key: draft.primary_key.into_iter().map(|(_, _, column)| column).collect(),
        foreign_keys: Vec::new(),
    }
}

struct ForeignKeyDraft {
    name: Option<String>,
    source: QualifiedName,
    target: QualifiedName,
    pairs: Vec<(i64, usize, Option<Identifier>, Option<Identifier>)>,
}

/// Group raw foreign key rows into [`ForeignKey`]s ordered by source table and name.
///
/// Rows of one constraint share `(schema, table, constraint_name)`; rows without a
/// constraint name are single-column keys. A constraint with a missing local column
/// name, or with referenced columns only partially listed, is skipped with a warning.
pub fn normalize_foreign_keys(
    rows: &[RawForeignKeyRow],
    policy: &NormalizePolicy,
) -> (Vec<ForeignKey>, Vec<Warning>) {
    let mut drafts: BTreeMap<(String, String), ForeignKeyDraft> = BTreeMap::new();
    let mut warnings = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let (source, target) = match (
            policy.table_name(row.schema.as_deref(), &row.table),
            policy.table_name(row.referenced_schema.as_deref(), &row.referenced_table),
        ) {
            (Ok(source), Ok(target)) => (source, target),
            (Err(err), _) | (_, Err(err)) => {
                warnings.push(Warning::new(
                    WarningCode::MalformedForeignKey,
                    row.constraint_name.clone().unwrap_or_else(|| row.table.clone()),
                    err.to_string(),
                ));
                continue;
            }
        };

        let name = row
            .constraint_name
            .as_deref()
            .map(|name| unquote(name, policy.unquote))
            .filter(|name| !name.is_empty());
        let group = match &name {
            Some(name) => policy.fold.fold(name),
            None => format!("#{index:08}"),
        };

        let draft = drafts
            .entry((source.key(), group))
            .or_insert_with(|| ForeignKeyDraft {
                name: name.clone(),
                source: source.clone(),
                target: target.clone(),
                pairs: Vec::new(),
            });
        draft.pairs.push((
            row.position.map(i64::from).unwrap_or(i64::MAX),
            index,
            row.column.as_deref().and_then(|column| policy.identifier(column)),
            row.referenced_column
                .as_deref()
                .and_then(|column| policy.identifier(column)),
        ));
    }

    let mut keys = Vec::new();
    for draft in drafts.into_values() {
        let subject = format!(
            "{}({})",
            draft.source,
            draft.name.as_deref().unwrap_or("unnamed")
        );
        let mut pairs = draft.pairs;
        pairs.sort_by_key(|(position, index, _, _)| (*position, *index));

        let columns: Option<Vec<Identifier>> =
            pairs.iter().map(|(_, _, column, _)| column.clone()).collect();
        let Some(columns) = columns else {
            warnings.push(Warning::new(
                WarningCode::MalformedForeignKey,
                subject,
                "foreign key row without a column name",
            ));
            continue;
        };

        let referenced: Vec<Identifier> = pairs
            .iter()
            .filter_map(|(_, _, _, referenced)| referenced.clone())
            .collect();
        if !referenced.is_empty() && referenced.len() != columns.len() {
            warnings.push(Warning::new(
                WarningCode::MalformedForeignKey,
                subject,
                "referenced columns are only partially listed",
            ));
            continue;
        }

        keys.push(ForeignKey {
            name: draft.name,
            source: draft.source,
            columns,
            target: draft.target,
            target_columns: referenced,
        });
    }

    (keys, warnings)
}
