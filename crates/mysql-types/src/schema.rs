//! MySQL schema column type conversion.
//!
//! Maps MySQL INFORMATION_SCHEMA column types to `UniversalType` for
//! schema introspection before extraction.

use sync_core::UniversalType;

/// Convert a MySQL INFORMATION_SCHEMA column type to UniversalType.
///
/// * `data_type` - `DATA_TYPE` (e.g., "int", "varchar", "timestamp")
/// * `column_type` - `COLUMN_TYPE` (e.g., "int(11) unsigned", "tinyint(1)")
/// * `precision` / `scale` - `NUMERIC_PRECISION` / `NUMERIC_SCALE`
///
/// ```
/// use mysql_types::mysql_column_to_universal_type;
/// use sync_core::UniversalType;
///
/// // TINYINT(1) is treated as boolean in MySQL
/// let ut = mysql_column_to_universal_type("TINYINT", "tinyint(1)", None, None);
/// assert_eq!(ut, UniversalType::Bool);
///
/// // BIGINT UNSIGNED does not fit in a signed 64-bit integer
/// let ut = mysql_column_to_universal_type("bigint", "bigint(20) unsigned", None, None);
/// assert_eq!(ut, UniversalType::decimal(20, 0));
/// ```
pub fn mysql_column_to_universal_type(
    data_type: &str,
    column_type: &str,
    precision: Option<u32>,
    scale: Option<u32>,
) -> UniversalType {
    let unsigned = column_type.to_lowercase().contains("unsigned");
    match data_type.to_uppercase().as_str() {
        "TINYINT" => {
            if column_type.to_lowercase().starts_with("tinyint(1)") {
                UniversalType::Bool
            } else {
                let width = extract_length_from_column_type(column_type)
                    .map(|l| l.min(u8::MAX as u16) as u8)
                    .unwrap_or(4);
                UniversalType::Int8 { width }
            }
        }
        "SMALLINT" | "YEAR" => UniversalType::Int16,
        "MEDIUMINT" => UniversalType::Int32,
        "INT" | "INTEGER" if unsigned => UniversalType::Int64,
        "INT" | "INTEGER" => UniversalType::Int32,
        "BIGINT" if unsigned => UniversalType::decimal(20, 0),
        "BIGINT" => UniversalType::Int64,
        "FLOAT" => UniversalType::Float32,
        "DOUBLE" | "REAL" => UniversalType::Float64,
        "DECIMAL" | "NUMERIC" => UniversalType::Decimal {
            // MySQL allows up to DECIMAL(65,30)
            precision: precision.map(|p| p.min(65) as u8).unwrap_or(10),
            scale: scale.map(|s| s.min(30) as u8).unwrap_or(0),
        },
        "BOOLEAN" | "BOOL" => UniversalType::Bool,
        "BIT" => {
            if extract_length_from_column_type(column_type) == Some(1) {
                UniversalType::Bool
            } else {
                UniversalType::Bytes
            }
        }

        "VARCHAR" => match extract_length_from_column_type(column_type) {
            Some(length) => UniversalType::VarChar { length },
            None => UniversalType::Text,
        },
        "CHAR" => {
            let length = extract_length_from_column_type(column_type).unwrap_or(1);
            UniversalType::Char { length }
        }
        "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" => UniversalType::Text,

        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            UniversalType::Bytes
        }

        "DATE" => UniversalType::Date,
        "TIME" => UniversalType::Time,
        // Both come back as wall-clock values in the session time zone.
        "TIMESTAMP" | "DATETIME" => UniversalType::LocalDateTime,

        "JSON" => UniversalType::Json,

        // Spatial values arrive as WKB with an SRID prefix.
        "GEOMETRY" | "POINT" | "LINESTRING" | "POLYGON" | "MULTIPOINT" | "MULTILINESTRING"
        | "MULTIPOLYGON" | "GEOMETRYCOLLECTION" => UniversalType::Bytes,

        "SET" => UniversalType::Set {
            values: extract_set_or_enum_values(column_type),
        },
        "ENUM" => UniversalType::Enum {
            values: extract_set_or_enum_values(column_type),
        },

        _ => UniversalType::Text,
    }
}

/// E.g., "varchar(255)" -> Some(255), "decimal(10,2)" -> Some(10)
fn extract_length_from_column_type(column_type: &str) -> Option<u16> {
    let start = column_type.find('(')?;
    let end = column_type[start..].find(')')? + start;
    let inner = &column_type[start + 1..end];
    inner.split(',').next()?.trim().parse().ok()
}

/// E.g., "enum('small','medium','large')" -> ["small", "medium", "large"]
///
/// Quotes inside values are doubled by MySQL (`'it''s'`), so this walks the
/// string instead of splitting on commas.
fn extract_set_or_enum_values(column_type: &str) -> Vec<String> {
    let Some(start) = column_type.find('(') else {
        return Vec::new();
    };
    let Some(end) = column_type.rfind(')') else {
        return Vec::new();
    };
    if start >= end {
        return Vec::new();
    }

    let mut values = Vec::new();
    let mut chars = column_type[start + 1..end].chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\'' {
            continue;
        }
        let mut value = String::new();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    value.push('\'');
                } else {
                    break;
                }
            } else {
                value.push(c);
            }
        }
        values.push(value);
    }
    values
}
