use schemalink_core::{
    Identifier, QualifiedName, QuoteStyle, RawColumnRow, RawForeignKeyRow, RawPrimaryKeyRow,
};

fn is_system_schema(schema: &str) -> bool {
    schema.starts_with("pg_") || schema == "information_schema"
}

fn schema_included(schema: Option<&str>, allow: Option<&[String]>) -> bool {
    let schema = schema.unwrap_or_default();
    match allow {
        Some(list) => list.iter().any(|item| item == schema),
        None => !is_system_schema(schema),
    }
}

pub fn filter_columns(raw: Vec<RawColumnRow>, allow: Option<&[String]>) -> Vec<RawColumnRow> {
    raw.into_iter()
        .filter(|row| schema_included(row.schema.as_deref(), allow))
        .collect()
}

pub fn filter_primary_keys(
    raw: Vec<RawPrimaryKeyRow>,
    allow: Option<&[String]>,
) -> Vec<RawPrimaryKeyRow> {
    raw.into_iter()
        .filter(|row| schema_included(row.schema.as_deref(), allow))
        .collect()
}

/// Keys are kept when their source table is; a referenced table outside the
/// allow-list is reported later as a dropped foreign key.
pub fn filter_foreign_keys(
    raw: Vec<RawForeignKeyRow>,
    allow: Option<&[String]>,
) -> Vec<RawForeignKeyRow> {
    raw.into_iter()
        .filter(|row| schema_included(row.schema.as_deref(), allow))
        .collect()
}

pub fn sample_query(table: &QualifiedName, column: &Identifier) -> String {
    let quote = QuoteStyle::DoubleQuote;
    let relation = match &table.schema {
        Some(schema) => format!(
            "{}.{}",
            quote.quote(schema.as_str()),
            quote.quote(table.name.as_str())
        ),
        None => quote.quote(table.name.as_str()),
    };
    let column = quote.quote(column.as_str());
    format!("select cast({column} as text) from {relation} where {column} is not null limit $1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemalink_core::FoldRule;

    fn column(schema: &str) -> RawColumnRow {
        RawColumnRow {
            schema: Some(schema.to_string()),
            table: "t".to_string(),
            column: Some("id".to_string()),
            data_type: "integer".to_string(),
            nullable: false,
            ordinal: Some(1),
        }
    }

    #[test]
    fn system_schemas_are_skipped_by_default() {
        let rows = vec![column("public"), column("pg_catalog"), column("information_schema")];
        let kept = filter_columns(rows, None);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].schema.as_deref(), Some("public"));
    }

    #[test]
    fn allow_list_wins_over_defaults() {
        let rows = vec![column("public"), column("app")];
        let allow = vec!["app".to_string()];
        let kept = filter_columns(rows, Some(allow.as_slice()));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].schema.as_deref(), Some("app"));
    }

    #[test]
    fn sample_query_quotes_identifiers() {
        let table = QualifiedName::new(Some("app"), "Order Lines", FoldRule::Lower);
        let column = Identifier::new("qty\"x", FoldRule::Lower);
        assert_eq!(
            sample_query(&table, &column),
            "select cast(\"qty\"\"x\" as text) from \"app\".\"Order Lines\" where \"qty\"\"x\" is not null limit $1"
        );
    }
}
