//! Forward conversion: UniversalValue -> MySQL value
//!
//! Used to bind watermark bounds and keyset cursors as statement parameters.

use chrono::{Datelike, Timelike};
use mysql_async::Value;
use sync_core::UniversalValue;

/// Convert a value into a MySQL statement parameter.
///
/// Zoned timestamps are bound as their UTC wall-clock time; callers that
/// compare against columns in another zone convert before binding.
pub fn to_mysql_value(value: &UniversalValue) -> Value {
    match value {
        UniversalValue::Null => Value::NULL,
        UniversalValue::Bool(b) => Value::Int(i64::from(*b)),
        UniversalValue::Int32(i) => Value::Int(i64::from(*i)),
        UniversalValue::Int64(i) => Value::Int(*i),
        UniversalValue::Float32(f) => Value::Float(*f),
        UniversalValue::Float64(f) => Value::Double(*f),
        UniversalValue::Decimal(s) => match value.as_integer().map(u64::try_from) {
            Some(Ok(n)) => Value::UInt(n),
            _ => Value::Bytes(s.as_bytes().to_vec()),
        },
        UniversalValue::Text(s) => Value::Bytes(s.as_bytes().to_vec()),
        UniversalValue::Bytes(b) => Value::Bytes(b.clone()),
        UniversalValue::Date(d) => Value::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0),
        UniversalValue::Time(t) => Value::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1_000,
        ),
        UniversalValue::LocalDateTime(dt) => datetime_value(dt),
        UniversalValue::ZonedDateTime(dt) => datetime_value(&dt.naive_utc()),
        UniversalValue::Uuid(u) => Value::Bytes(u.to_string().into_bytes()),
        UniversalValue::Json(j) => Value::Bytes(j.to_string().into_bytes()),
    }
}

fn datetime_value(dt: &chrono::NaiveDateTime) -> Value {
    Value::Date(
        dt.year() as u16,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
        dt.nanosecond() / 1_000,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_datetime_param() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_micro_opt(3, 4, 5, 6)
            .unwrap();
        assert_eq!(
            to_mysql_value(&UniversalValue::LocalDateTime(dt)),
            Value::Date(2024, 1, 2, 3, 4, 5, 6)
        );
    }

    #[test]
    fn test_scalar_params() {
        assert_eq!(to_mysql_value(&UniversalValue::Int64(7)), Value::Int(7));
        assert_eq!(to_mysql_value(&UniversalValue::Bool(true)), Value::Int(1));
        assert_eq!(
            to_mysql_value(&UniversalValue::Text("x".into())),
            Value::Bytes(b"x".to_vec())
        );
        assert_eq!(to_mysql_value(&UniversalValue::Null), Value::NULL);
    }

    #[test]
    fn test_whole_decimals_bind_as_unsigned() {
        assert_eq!(
            to_mysql_value(&UniversalValue::Decimal(u64::MAX.to_string())),
            Value::UInt(u64::MAX)
        );
        assert_eq!(
            to_mysql_value(&UniversalValue::Decimal("10.50".into())),
            Value::Bytes(b"10.50".to_vec())
        );
        assert_eq!(
            to_mysql_value(&UniversalValue::Decimal("-3".into())),
            Value::Bytes(b"-3".to_vec())
        );
    }
}
