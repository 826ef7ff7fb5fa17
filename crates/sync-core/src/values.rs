//! Row and value representation passed between pipeline stages.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single column value.
///
/// Source drivers produce these from native values; the transformer
/// normalizes them into the subset the warehouse accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum UniversalValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    /// Exact decimal kept as its canonical string form
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    /// Wall-clock timestamp in the source's zone
    LocalDateTime(NaiveDateTime),
    /// Absolute instant
    ZonedDateTime(DateTime<Utc>),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
}

impl UniversalValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whole-number value of integer and integral decimal values.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Self::Int32(n) => Some(i128::from(*n)),
            Self::Int64(n) => Some(i128::from(*n)),
            Self::Decimal(s) => {
                let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
                if fraction.bytes().all(|b| b == b'0') {
                    whole.parse().ok()
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Float32(_) => "float32",
            Self::Float64(_) => "float64",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::LocalDateTime(_) => "local_datetime",
            Self::ZonedDateTime(_) => "zoned_datetime",
            Self::Uuid(_) => "uuid",
            Self::Json(_) => "json",
        }
    }
}

impl fmt::Display for UniversalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Decimal(v) | Self::Text(v) => write!(f, "{v}"),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Self::Date(v) => write!(f, "{v}"),
            Self::Time(v) => write!(f, "{v}"),
            Self::LocalDateTime(v) => write!(f, "{v}"),
            Self::ZonedDateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Uuid(v) => write!(f, "{v}"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

// ============================================================================
// Rows
// ============================================================================

/// An ordered mapping of column name to value.
///
/// Column order is preserved from the source query so that downstream
/// statements list columns deterministically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniversalRow {
    values: Vec<(String, UniversalValue)>,
}

impl UniversalRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    /// Builder-style insert, handy in tests and fixtures.
    pub fn with(mut self, column: impl Into<String>, value: UniversalValue) -> Self {
        self.set(column, value);
        self
    }

    /// Sets a column, replacing any existing value in place.
    pub fn set(&mut self, column: impl Into<String>, value: UniversalValue) {
        let column = column.into();
        match self.values.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.values.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&UniversalValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, column: &str) -> Option<UniversalValue> {
        let idx = self.values.iter().position(|(name, _)| name == column)?;
        Some(self.values.remove(idx).1)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniversalValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl IntoIterator for UniversalRow {
    type Item = (String, UniversalValue);
    type IntoIter = std::vec::IntoIter<(String, UniversalValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl FromIterator<(String, UniversalValue)> for UniversalRow {
    fn from_iter<I: IntoIterator<Item = (String, UniversalValue)>>(iter: I) -> Self {
        let mut row = UniversalRow::new();
        for (column, value) in iter {
            row.set(column, value);
        }
        row
    }
}
