use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How catalog identifiers are folded before comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FoldRule {
    /// Compare lower-cased names (Postgres, MySQL on most platforms).
    #[default]
    Lower,
    /// Compare upper-cased names (Oracle, DB2).
    Upper,
    /// Compare names exactly as the catalog returned them.
    Preserve,
}

impl FoldRule {
    pub fn fold(self, value: &str) -> String {
        match self {
            FoldRule::Lower => value.to_lowercase(),
            FoldRule::Upper => value.to_uppercase(),
            FoldRule::Preserve => value.to_string(),
        }
    }
}

/// A catalog identifier: original spelling for display, folded key for comparison.
///
/// Equality, ordering and hashing only look at the folded key, so `Orders` and
/// `ORDERS` are the same identifier under [`FoldRule::Lower`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Identifier {
    pub name: String,
    pub key: String,
}

impl Identifier {
    pub fn new(name: impl Into<String>, fold: FoldRule) -> Self {
        let name = name.into();
        let key = fold.fold(&name);
        Self { name, key }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Identifier {}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct QualifiedName {
    pub schema: Option<Identifier>,
    pub name: Identifier,
}

impl QualifiedName {
    pub fn new(schema: Option<&str>, name: &str, fold: FoldRule) -> Self {
        Self {
            schema: schema.map(|schema| Identifier::new(schema, fold)),
            name: Identifier::new(name, fold),
        }
    }

    /// Parse `schema.table` or a bare `table`.
    pub fn parse(value: &str, fold: FoldRule) -> Self {
        match value.split_once('.') {
            Some((schema, name)) if !schema.is_empty() => Self::new(Some(schema), name, fold),
            _ => Self::new(None, value, fold),
        }
    }

    /// Folded `schema.table` key used for map lookups.
    pub fn key(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema.key, self.name.key),
            None => self.name.key.clone(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_compare_by_folded_key() {
        let upper = Identifier::new("ORDERS", FoldRule::Lower);
        let lower = Identifier::new("orders", FoldRule::Lower);
        assert_eq!(upper, lower);
        assert_eq!(upper.as_str(), "ORDERS");

        let preserved = Identifier::new("ORDERS", FoldRule::Preserve);
        assert_ne!(preserved, Identifier::new("orders", FoldRule::Preserve));
    }

    #[test]
    fn parses_qualified_and_bare_names() {
        let qualified = QualifiedName::parse("Sales.Orders", FoldRule::Lower);
        assert_eq!(qualified.key(), "sales.orders");
        assert_eq!(qualified.to_string(), "Sales.Orders");

        let bare = QualifiedName::parse("orders", FoldRule::Upper);
        assert!(bare.schema.is_none());
        assert_eq!(bare.key(), "ORDERS");
    }
}
