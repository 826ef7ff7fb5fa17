//! Row transformation from source values to warehouse-typed values.
//!
//! Pure: no I/O, no failure on well-typed input. Values that cannot be
//! represented in their target type are passed through unchanged and left
//! for the destination to reject.

use chrono::NaiveTime;
use chrono_tz::Tz;
use sync_core::{local_to_utc, UniversalRow, UniversalValue, WarehouseType};

use crate::reconcile::SchemaDiff;

/// Applies one mapping's schema decisions to every extracted row.
#[derive(Debug, Clone)]
pub struct Transformer {
    columns: Vec<(String, WarehouseType)>,
    dropped: Vec<String>,
    source_tz: Tz,
}

impl Transformer {
    pub fn new(diff: &SchemaDiff, source_tz: Tz) -> Self {
        Self {
            columns: diff
                .load_columns
                .iter()
                .map(|c| (c.name.clone(), c.data_type))
                .collect(),
            dropped: diff.dropped_columns().into_iter().map(String::from).collect(),
            source_tz,
        }
    }

    /// Source columns that are removed from every row.
    pub fn dropped_columns(&self) -> &[String] {
        &self.dropped
    }

    /// Emits exactly the loaded columns, in load order. A loaded column
    /// absent from the row becomes NULL.
    pub fn transform(&self, row: &UniversalRow) -> UniversalRow {
        let mut out = UniversalRow::with_capacity(self.columns.len());
        for (name, target) in &self.columns {
            let value = row.get(name).cloned().unwrap_or(UniversalValue::Null);
            out.set(name.clone(), coerce(value, *target, self.source_tz));
        }
        out
    }
}

/// Free-function form of [`Transformer::transform`].
pub fn transform(row: &UniversalRow, diff: &SchemaDiff, source_tz: Tz) -> UniversalRow {
    Transformer::new(diff, source_tz).transform(row)
}

/// Converts one value to the representation of `target`.
pub fn coerce(value: UniversalValue, target: WarehouseType, tz: Tz) -> UniversalValue {
    use UniversalValue as V;
    use WarehouseType as W;

    match (value, target) {
        (V::Null, _) => V::Null,
        // Empty strings are the source's "no value" sentinel.
        (V::Text(s), _) if s.is_empty() => V::Null,

        (V::Bool(b), W::Bool) => V::Bool(b),
        (V::Int32(i), W::Bool) => V::Bool(i != 0),
        (V::Int64(i), W::Bool) => V::Bool(i != 0),

        (V::Int32(i), W::Int64) => V::Int64(i64::from(i)),
        (V::Int64(i), W::Int64) => V::Int64(i),
        (V::Bool(b), W::Int64) => V::Int64(i64::from(b)),

        // Shortest decimal form, so 0.1f32 does not become 0.10000000149.
        (V::Float32(f), W::Float64) => V::Float64(f.to_string().parse().unwrap_or(f as f64)),
        (V::Float64(f), W::Float64) => V::Float64(f),
        (V::Int32(i), W::Float64) => V::Float64(f64::from(i)),
        (V::Int64(i), W::Float64) => V::Float64(i as f64),

        (V::Decimal(s), W::Numeric | W::BigNumeric) => V::Decimal(s),
        (V::Int32(i), W::Numeric | W::BigNumeric) => V::Decimal(i.to_string()),
        (V::Int64(i), W::Numeric | W::BigNumeric) => V::Decimal(i.to_string()),
        (V::Bool(b), W::Numeric | W::BigNumeric) => V::Decimal(u8::from(b).to_string()),

        (V::Text(s), W::String) => V::Text(s),
        (V::Json(j), W::String) => V::Text(j.to_string()),
        (V::Bytes(b), W::String) => match String::from_utf8(b) {
            Ok(s) => V::Text(s),
            Err(e) => V::Bytes(e.into_bytes()),
        },
        (V::ZonedDateTime(dt), W::String) => V::Text(dt.to_rfc3339()),
        (V::LocalDateTime(dt), W::String) => V::Text(local_to_utc(dt, tz).to_rfc3339()),
        (v @ (V::Int32(_) | V::Int64(_) | V::Float32(_) | V::Float64(_)), W::String) => {
            V::Text(v.to_string())
        }
        (v @ (V::Decimal(_) | V::Bool(_) | V::Uuid(_) | V::Date(_) | V::Time(_)), W::String) => {
            V::Text(v.to_string())
        }

        (V::Json(j), W::Json) => V::Json(j),
        (V::Text(s), W::Json) => match serde_json::from_str(&s) {
            Ok(j) => V::Json(j),
            Err(_) => V::Json(serde_json::Value::String(s)),
        },

        (V::Bytes(b), W::Bytes) => V::Bytes(b),
        (V::Text(s), W::Bytes) => V::Bytes(s.into_bytes()),

        (V::Date(d), W::Date) => V::Date(d),
        (V::LocalDateTime(dt), W::Date) => V::Date(dt.date()),
        (V::Time(t), W::Time) => V::Time(t),

        (V::LocalDateTime(dt), W::Timestamp) => V::ZonedDateTime(local_to_utc(dt, tz)),
        (V::ZonedDateTime(dt), W::Timestamp) => V::ZonedDateTime(dt),
        (V::Date(d), W::Timestamp) => V::ZonedDateTime(local_to_utc(d.and_time(NaiveTime::MIN), tz)),

        (V::LocalDateTime(dt), W::Datetime) => V::LocalDateTime(dt),

        (other, _) => other,
    }
}
