use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ident::QualifiedName;
use crate::resolve::JoinPath;

/// Identifier quoting rule of a SQL dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStyle {
    None,
    /// `"name"` (ANSI, Postgres, Oracle, SQLite).
    #[default]
    DoubleQuote,
    /// `` `name` `` (MySQL, MariaDB).
    Backtick,
    /// `[name]` (SQL Server).
    Bracket,
}

impl QuoteStyle {
    pub fn quote(self, ident: &str) -> String {
        match self {
            QuoteStyle::None => ident.to_string(),
            QuoteStyle::DoubleQuote => format!("\"{}\"", ident.replace('"', "\"\"")),
            QuoteStyle::Backtick => format!("`{}`", ident.replace('`', "``")),
            QuoteStyle::Bracket => format!("[{}]", ident.replace(']', "]]")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
}

impl JoinType {
    fn keyword(self) -> &'static str {
        match self {
            JoinType::Inner => "JOIN",
            JoinType::Left => "LEFT JOIN",
        }
    }
}

/// Rendering policy supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Dialect {
    pub quote: QuoteStyle,
    pub join_type: JoinType,
    /// Prefix table references with their schema when one is known.
    pub qualify_schema: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            quote: QuoteStyle::DoubleQuote,
            join_type: JoinType::Inner,
            qualify_schema: true,
        }
    }
}

impl Dialect {
    pub fn with_quote(quote: QuoteStyle) -> Self {
        Self {
            quote,
            ..Self::default()
        }
    }
}

/// Render a resolved join path as a `SELECT *` statement.
///
/// Each step becomes one `JOIN <table> ON <left> = <right>` clause; composite keys
/// chain their column pairs with `AND` in key order. A table joined a second time
/// (self-join) or sharing its name with a table of another schema gets an alias.
pub fn render(path: &JoinPath, dialect: &Dialect) -> String {
    let mut aliases = Aliases::for_path(path);
    let root_ref = aliases.first_instance(&path.root);

    let mut sql = format!(
        "SELECT *\nFROM {}",
        table_reference(&path.root, &root_ref, dialect)
    );

    for step in &path.steps {
        let from_ref = aliases.first_instance(&step.from);
        let to_ref = if step.from == step.to {
            aliases.new_instance(&step.to)
        } else {
            aliases.first_instance(&step.to)
        };

        let (left_columns, right_columns) = step.edge.columns_from(&step.from);
        let predicate = left_columns
            .iter()
            .zip(right_columns)
            .map(|(left, right)| {
                format!(
                    "{}.{} = {}.{}",
                    dialect.quote.quote(&from_ref),
                    dialect.quote.quote(left.as_str()),
                    dialect.quote.quote(&to_ref),
                    dialect.quote.quote(right.as_str())
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ");

        sql.push_str(&format!(
            "\n{} {} ON {}",
            dialect.join_type.keyword(),
            table_reference(&step.to, &to_ref, dialect),
            predicate
        ));
    }

    sql
}

fn table_reference(table: &QualifiedName, reference: &str, dialect: &Dialect) -> String {
    let mut rendered = match (&table.schema, dialect.qualify_schema) {
        (Some(schema), true) => format!(
            "{}.{}",
            dialect.quote.quote(schema.as_str()),
            dialect.quote.quote(table.name.as_str())
        ),
        _ => dialect.quote.quote(table.name.as_str()),
    };
    if reference != table.name.as_str() {
        rendered.push_str(&format!(" AS {}", dialect.quote.quote(reference)));
    }
    rendered
}

// Hands out the name each table instance is referenced by in ON clauses. Bare names
// of every table in the path are reserved so that no alias shadows a real table.
struct Aliases {
    by_table: BTreeMap<String, String>,
    reserved: BTreeSet<String>,
    taken: BTreeSet<String>,
}

impl Aliases {
    fn for_path(path: &JoinPath) -> Self {
        Self {
            by_table: BTreeMap::new(),
            reserved: path
                .tables()
                .into_iter()
                .map(|table| table.name.key.clone())
                .collect(),
            taken: BTreeSet::new(),
        }
    }

    fn first_instance(&mut self, table: &QualifiedName) -> String {
        if let Some(reference) = self.by_table.get(&table.key()) {
            return reference.clone();
        }
        let reference = self.new_instance(table);
        self.by_table.insert(table.key(), reference.clone());
        reference
    }

    fn new_instance(&mut self, table: &QualifiedName) -> String {
        let name = &table.name;
        if self.taken.insert(name.key.clone()) {
            return name.as_str().to_string();
        }
        let mut suffix = 2;
        loop {
            let key = format!("{}_{suffix}", name.key);
            if !self.reserved.contains(&key) && self.taken.insert(key) {
                return format!("{}_{suffix}", name.as_str());
            }
            suffix += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_and_escapes_per_style() {
        assert_eq!(QuoteStyle::DoubleQuote.quote("order"), "\"order\"");
        assert_eq!(QuoteStyle::DoubleQuote.quote("a\"b"), "\"a\"\"b\"");
        assert_eq!(QuoteStyle::Backtick.quote("order"), "`order`");
        assert_eq!(QuoteStyle::Bracket.quote("a]b"), "[a]]b]");
        assert_eq!(QuoteStyle::None.quote("order"), "order");
    }
}
