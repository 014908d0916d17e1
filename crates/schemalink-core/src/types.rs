use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Normalized column type, independent of the source dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Integer,
    Decimal,
    Text,
    Date,
    Datetime,
    Binary,
    Boolean,
    Unknown,
}

/// Coarse grouping of [`DataType`]s that can plausibly be joined on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TypeFamily {
    Numeric,
    Text,
    Temporal,
    Binary,
    Boolean,
    Unknown,
}

impl DataType {
    /// Map a catalog type string (`varchar(255)`, `NUMBER(10,0)`, `int4`, ...) onto a
    /// normalized type. Unrecognized strings map to [`DataType::Unknown`].
    pub fn from_catalog(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        let base = lowered
            .split(['(', '[', ' '])
            .next()
            .unwrap_or_default()
            .trim_matches('"');

        match base {
            "int" | "int2" | "int4" | "int8" | "integer" | "smallint" | "bigint" | "tinyint"
            | "mediumint" | "serial" | "serial4" | "serial8" | "bigserial" | "smallserial"
            | "long" => DataType::Integer,
            "number" => number_type(&lowered),
            "numeric" | "decimal" | "dec" | "real" | "float" | "float4" | "float8" | "double"
            | "money" | "smallmoney" => DataType::Decimal,
            "char" | "character" | "varchar" | "varchar2" | "nvarchar" | "nvarchar2"
            | "nchar" | "text" | "ntext" | "tinytext" | "mediumtext" | "longtext" | "string"
            | "clob" | "nclob" | "uuid" | "uniqueidentifier" | "citext" | "bpchar" | "name" => {
                DataType::Text
            }
            "date" => DataType::Date,
            "timestamp" | "timestamptz" | "datetime" | "datetime2" | "smalldatetime"
            | "datetimeoffset" => DataType::Datetime,
            "bytea" | "blob" | "binary" | "varbinary" | "longblob" | "mediumblob" | "raw"
            | "image" => DataType::Binary,
            "bool" | "boolean" | "bit" => DataType::Boolean,
            _ => DataType::Unknown,
        }
    }

    pub fn family(self) -> TypeFamily {
        match self {
            DataType::Integer | DataType::Decimal => TypeFamily::Numeric,
            DataType::Text => TypeFamily::Text,
            DataType::Date | DataType::Datetime => TypeFamily::Temporal,
            DataType::Binary => TypeFamily::Binary,
            DataType::Boolean => TypeFamily::Boolean,
            DataType::Unknown => TypeFamily::Unknown,
        }
    }
}

// Oracle-style NUMBER(p, 0) is an integer, NUMBER(p, s>0) is a decimal.
fn number_type(lowered: &str) -> DataType {
    let scale = lowered
        .split_once('(')
        .and_then(|(_, args)| args.trim_end_matches(')').split(',').nth(1))
        .and_then(|scale| scale.trim().parse::<u32>().ok());
    match scale {
        Some(0) => DataType::Integer,
        _ => DataType::Decimal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_common_dialect_spellings() {
        assert_eq!(DataType::from_catalog("int4"), DataType::Integer);
        assert_eq!(DataType::from_catalog("BIGINT"), DataType::Integer);
        assert_eq!(DataType::from_catalog("character varying(255)"), DataType::Text);
        assert_eq!(DataType::from_catalog("double precision"), DataType::Decimal);
        assert_eq!(DataType::from_catalog("NUMBER(10,0)"), DataType::Integer);
        assert_eq!(DataType::from_catalog("NUMBER(10,2)"), DataType::Decimal);
        assert_eq!(DataType::from_catalog("timestamp with time zone"), DataType::Datetime);
        assert_eq!(DataType::from_catalog("bytea"), DataType::Binary);
        assert_eq!(DataType::from_catalog("tsvector"), DataType::Unknown);
    }

    #[test]
    fn families_group_compatible_types() {
        assert_eq!(DataType::Integer.family(), DataType::Decimal.family());
        assert_ne!(DataType::Integer.family(), DataType::Text.family());
    }
}
