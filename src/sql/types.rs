//! SQL-level data types.
//!
//! These are the logical result types a parser may attach to AST nodes. The
//! splitter consults them for exactly one decision: whether a column value
//! survives the map→reduce transport unchanged, or needs a defensive cast
//! back to its declared type on the reduce side (see
//! [`DataType::requires_transport_cast`]).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical SQL data type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean type.
    Bool,

    /// 8-bit signed integer (TINYINT in most databases).
    Int8,

    /// 16-bit signed integer (SMALLINT).
    Int16,

    /// 32-bit signed integer (INT/INTEGER).
    Int32,

    /// 64-bit signed integer (BIGINT).
    Int64,

    /// 32-bit floating point (REAL/FLOAT4).
    Float32,

    /// 64-bit floating point (DOUBLE).
    Float64,

    /// Fixed-precision decimal: precision (total digits), scale.
    Decimal(u8, u8),

    /// Variable-length string.
    String,

    /// Date without time.
    Date,

    /// Time without date.
    Time,

    /// Timestamp without timezone.
    Timestamp,

    /// Timestamp with timezone.
    TimestampTz,

    /// Binary data (BLOB, BYTEA, VARBINARY).
    Binary,

    /// JSON data type.
    Json,

    /// UUID/GUID type.
    Uuid,
}

impl DataType {
    /// Parse a SQL data type from a string.
    ///
    /// Accepts the common spellings: `bool`/`boolean`, `tinyint`, `smallint`,
    /// `int`/`integer`, `bigint`, `real`, `double`/`double precision`,
    /// `decimal(p,s)`/`numeric(p,s)`, `text`/`varchar`/`string`, `date`,
    /// `time`, `timestamp`, `timestamptz`, `binary`/`blob`/`bytea`,
    /// `json`/`jsonb`, `uuid`/`guid`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();

        if let Some(inner) =
            extract_parens(&s, "decimal").or_else(|| extract_parens(&s, "numeric"))
        {
            return parse_decimal_params(&inner);
        }

        match s.as_str() {
            "bool" | "boolean" | "bit" => Some(DataType::Bool),

            "tinyint" => Some(DataType::Int8),
            "smallint" | "int2" => Some(DataType::Int16),
            "int" | "integer" | "int4" => Some(DataType::Int32),
            "bigint" | "int8" => Some(DataType::Int64),

            "real" | "float4" => Some(DataType::Float32),
            "double" | "float8" | "double precision" | "float" => Some(DataType::Float64),

            "decimal" | "numeric" | "number" => Some(DataType::Decimal(18, 2)),

            "text" | "string" | "clob" | "varchar" | "char" | "character varying" => {
                Some(DataType::String)
            }

            "date" => Some(DataType::Date),
            "time" => Some(DataType::Time),
            "timestamp" | "datetime" => Some(DataType::Timestamp),
            "timestamptz" | "timestamp with time zone" => Some(DataType::TimestampTz),

            "binary" | "blob" | "bytea" | "varbinary" => Some(DataType::Binary),

            "json" | "jsonb" => Some(DataType::Json),

            "uuid" | "guid" => Some(DataType::Uuid),

            _ => None,
        }
    }

    /// Returns true if this is a numeric type.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::Float32
                | DataType::Float64
                | DataType::Decimal(_, _)
        )
    }

    /// Returns true if this is a temporal (date/time) type.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            DataType::Date | DataType::Time | DataType::Timestamp | DataType::TimestampTz
        )
    }

    /// Whether a value of this type needs an explicit cast back to its
    /// declared type after crossing the map→reduce transport.
    ///
    /// The transport representation is not self-describing for every type:
    /// UUIDs travel as raw bytes, so a reduce-side column reference must be
    /// wrapped in `CAST(... AS UUID)` to restore the logical type.
    pub fn requires_transport_cast(&self) -> bool {
        matches!(self, DataType::Uuid)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Bool => write!(f, "BOOLEAN"),
            DataType::Int8 => write!(f, "TINYINT"),
            DataType::Int16 => write!(f, "SMALLINT"),
            DataType::Int32 => write!(f, "INTEGER"),
            DataType::Int64 => write!(f, "BIGINT"),
            DataType::Float32 => write!(f, "REAL"),
            DataType::Float64 => write!(f, "DOUBLE"),
            DataType::Decimal(p, s) => write!(f, "DECIMAL({}, {})", p, s),
            DataType::String => write!(f, "VARCHAR"),
            DataType::Date => write!(f, "DATE"),
            DataType::Time => write!(f, "TIME"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::TimestampTz => write!(f, "TIMESTAMP WITH TIME ZONE"),
            DataType::Binary => write!(f, "BINARY"),
            DataType::Json => write!(f, "JSON"),
            DataType::Uuid => write!(f, "UUID"),
        }
    }
}

/// Extract content inside parentheses for a given type prefix.
/// e.g., extract_parens("decimal(10,2)", "decimal") returns Some("10,2")
fn extract_parens(s: &str, prefix: &str) -> Option<String> {
    let s = s.trim();
    if !s.starts_with(prefix) {
        return None;
    }

    let rest = s[prefix.len()..].trim();
    if !rest.starts_with('(') || !rest.ends_with(')') {
        return None;
    }

    Some(rest[1..rest.len() - 1].to_string())
}

/// Parse decimal parameters "precision,scale" or "precision, scale".
fn parse_decimal_params(inner: &str) -> Option<DataType> {
    let parts: Vec<&str> = inner.split(',').map(|s| s.trim()).collect();
    if parts.len() != 2 {
        return None;
    }

    let precision: u8 = parts[0].parse().ok()?;
    let scale: u8 = parts[1].parse().ok()?;

    Some(DataType::Decimal(precision, scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_types() {
        assert_eq!(DataType::parse("bool"), Some(DataType::Bool));
        assert_eq!(DataType::parse("BOOLEAN"), Some(DataType::Bool));
        assert_eq!(DataType::parse("bigint"), Some(DataType::Int64));
        assert_eq!(DataType::parse("double"), Some(DataType::Float64));
        assert_eq!(DataType::parse("double precision"), Some(DataType::Float64));
        assert_eq!(DataType::parse("text"), Some(DataType::String));
        assert_eq!(DataType::parse("timestamptz"), Some(DataType::TimestampTz));
        assert_eq!(DataType::parse("uuid"), Some(DataType::Uuid));
        assert_eq!(DataType::parse("unknown_type"), None);
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(
            DataType::parse("decimal(10,2)"),
            Some(DataType::Decimal(10, 2))
        );
        assert_eq!(
            DataType::parse("NUMERIC(38, 0)"),
            Some(DataType::Decimal(38, 0))
        );
        assert_eq!(DataType::parse("decimal(abc)"), None);
    }

    #[test]
    fn test_type_predicates() {
        assert!(DataType::Int64.is_numeric());
        assert!(DataType::Decimal(18, 2).is_numeric());
        assert!(!DataType::String.is_numeric());
        assert!(DataType::Date.is_temporal());
        assert!(!DataType::Uuid.is_temporal());
    }

    #[test]
    fn test_transport_cast() {
        // UUID is the one type whose transport form is not self-describing.
        assert!(DataType::Uuid.requires_transport_cast());
        assert!(!DataType::Int64.requires_transport_cast());
        assert!(!DataType::String.requires_transport_cast());
        assert!(!DataType::Binary.requires_transport_cast());
    }

    #[test]
    fn test_display() {
        assert_eq!(DataType::Int64.to_string(), "BIGINT");
        assert_eq!(DataType::Float64.to_string(), "DOUBLE");
        assert_eq!(DataType::Uuid.to_string(), "UUID");
        assert_eq!(DataType::Decimal(18, 2).to_string(), "DECIMAL(18, 2)");
    }
}
