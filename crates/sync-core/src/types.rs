//! Type universes shared by the source side and the warehouse side.
//!
//! [`UniversalType`] describes what a source column holds, independent of the
//! driver that produced it. [`WarehouseType`] is the closed set of column
//! types the destination warehouse understands.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source column type, as discovered by schema introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UniversalType {
    /// Boolean (MySQL `BOOL`/`TINYINT(1)`)
    Bool,

    /// 8-bit integer with display width
    Int8 { width: u8 },

    /// 16-bit integer
    Int16,

    /// 32-bit integer (also covers `MEDIUMINT`)
    Int32,

    /// 64-bit integer
    Int64,

    /// Single precision float
    Float32,

    /// Double precision float
    Float64,

    /// Exact decimal
    Decimal { precision: u8, scale: u8 },

    /// Fixed-length character string
    Char { length: u16 },

    /// Variable-length character string
    VarChar { length: u16 },

    /// Unbounded text
    Text,

    /// Binary data of any length
    Bytes,

    /// Calendar date
    Date,

    /// Time of day
    Time,

    /// Date and time without a zone. Interpreted in the source's zone.
    LocalDateTime,

    /// Date and time with an explicit zone
    ZonedDateTime,

    /// UUID
    Uuid,

    /// JSON document
    Json,

    /// Enumeration (one value from a fixed set)
    Enum { values: Vec<String> },

    /// Set (zero or more values from a fixed set)
    Set { values: Vec<String> },
}

impl UniversalType {
    pub fn decimal(precision: u8, scale: u8) -> Self {
        Self::Decimal { precision, scale }
    }

    pub fn varchar(length: u16) -> Self {
        Self::VarChar { length }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int8 { .. } | Self::Int16 | Self::Int32 | Self::Int64
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, Self::Float32 | Self::Float64 | Self::Decimal { .. })
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            Self::Date | Self::Time | Self::LocalDateTime | Self::ZonedDateTime
        )
    }

    /// Integer ordinals, including whole decimals like `BIGINT UNSIGNED`.
    pub fn is_integral(&self) -> bool {
        self.is_integer() || matches!(self, Self::Decimal { scale: 0, .. })
    }

    /// Whether values of this type can drive a watermark.
    pub fn is_watermark_capable(&self) -> bool {
        self.is_integral()
            || matches!(self, Self::Date | Self::LocalDateTime | Self::ZonedDateTime)
    }

    /// Whether a warehouse column of type `column` holds every value of this
    /// type. Decimals are checked digit by digit.
    pub fn fits_in(&self, column: WarehouseType) -> bool {
        match self {
            Self::Decimal { precision, scale } => {
                let whole = precision.saturating_sub(*scale);
                match column {
                    WarehouseType::Int64 => *scale == 0 && *precision <= 18,
                    WarehouseType::Numeric => numeric_holds(*precision, *scale),
                    WarehouseType::BigNumeric => whole <= 38 && *scale <= 38,
                    _ => false,
                }
            }
            _ => column.can_hold(self.warehouse_type()),
        }
    }

    /// The warehouse column type a value of this type is loaded as.
    pub fn warehouse_type(&self) -> WarehouseType {
        match self {
            Self::Bool => WarehouseType::Bool,
            Self::Int8 { .. } | Self::Int16 | Self::Int32 | Self::Int64 => WarehouseType::Int64,
            Self::Float32 | Self::Float64 => WarehouseType::Float64,
            Self::Decimal { precision, scale } if numeric_holds(*precision, *scale) => {
                WarehouseType::Numeric
            }
            Self::Decimal { .. } => WarehouseType::BigNumeric,
            Self::Char { .. }
            | Self::VarChar { .. }
            | Self::Text
            | Self::Uuid
            | Self::Json
            | Self::Enum { .. }
            | Self::Set { .. } => WarehouseType::String,
            Self::Bytes => WarehouseType::Bytes,
            Self::Date => WarehouseType::Date,
            Self::Time => WarehouseType::Time,
            Self::LocalDateTime | Self::ZonedDateTime => WarehouseType::Timestamp,
        }
    }
}

/// NUMERIC holds 29 digits before the point and 9 after it.
fn numeric_holds(precision: u8, scale: u8) -> bool {
    precision.saturating_sub(scale) <= 29 && scale <= 9
}

impl fmt::Display for UniversalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int8 { width } => write!(f, "int8({width})"),
            Self::Int16 => write!(f, "int16"),
            Self::Int32 => write!(f, "int32"),
            Self::Int64 => write!(f, "int64"),
            Self::Float32 => write!(f, "float32"),
            Self::Float64 => write!(f, "float64"),
            Self::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            Self::Char { length } => write!(f, "char({length})"),
            Self::VarChar { length } => write!(f, "varchar({length})"),
            Self::Text => write!(f, "text"),
            Self::Bytes => write!(f, "bytes"),
            Self::Date => write!(f, "date"),
            Self::Time => write!(f, "time"),
            Self::LocalDateTime => write!(f, "local_datetime"),
            Self::ZonedDateTime => write!(f, "zoned_datetime"),
            Self::Uuid => write!(f, "uuid"),
            Self::Json => write!(f, "json"),
            Self::Enum { .. } => write!(f, "enum"),
            Self::Set { .. } => write!(f, "set"),
        }
    }
}

// ============================================================================
// Warehouse types
// ============================================================================

/// Column type in the destination warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarehouseType {
    Bool,
    Int64,
    Float64,
    Numeric,
    BigNumeric,
    String,
    Bytes,
    Date,
    Time,
    Datetime,
    Timestamp,
    Json,
}

impl WarehouseType {
    /// DDL spelling of the type.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Bool => "BOOL",
            Self::Int64 => "INT64",
            Self::Float64 => "FLOAT64",
            Self::Numeric => "NUMERIC",
            Self::BigNumeric => "BIGNUMERIC",
            Self::String => "STRING",
            Self::Bytes => "BYTES",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Datetime => "DATETIME",
            Self::Timestamp => "TIMESTAMP",
            Self::Json => "JSON",
        }
    }

    /// Whether a column of type `self` can hold every value of `from`
    /// without loss or ambiguous reinterpretation.
    pub fn can_hold(&self, from: WarehouseType) -> bool {
        use WarehouseType::*;
        if *self == from {
            return true;
        }
        matches!(
            (from, *self),
            (Int64, Numeric)
                | (Int64, BigNumeric)
                | (Numeric, BigNumeric)
                | (Bool, Int64)
                | (Json, String)
        )
    }
}

impl fmt::Display for WarehouseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown warehouse type: {0}")]
pub struct UnknownWarehouseType(pub String);

impl FromStr for WarehouseType {
    type Err = UnknownWarehouseType;

    /// Parses the type names reported by the warehouse's information schema,
    /// including legacy aliases and parameterized forms like `NUMERIC(10, 2)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let base = upper.split('(').next().unwrap_or_default().trim();
        let ty = match base {
            "BOOL" | "BOOLEAN" => Self::Bool,
            "INT64" | "INT" | "INTEGER" | "SMALLINT" | "BIGINT" | "TINYINT" | "BYTEINT" => {
                Self::Int64
            }
            "FLOAT64" | "FLOAT" => Self::Float64,
            "NUMERIC" | "DECIMAL" => Self::Numeric,
            "BIGNUMERIC" | "BIGDECIMAL" => Self::BigNumeric,
            "STRING" => Self::String,
            "BYTES" => Self::Bytes,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "DATETIME" => Self::Datetime,
            "TIMESTAMP" => Self::Timestamp,
            "JSON" => Self::Json,
            _ => return Err(UnknownWarehouseType(s.to_string())),
        };
        Ok(ty)
    }
}
