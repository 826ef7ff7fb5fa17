//! Reverse conversion: MySQL values -> UniversalValue
//!
//! Conversion is driven by the introspected column type rather than by the
//! wire value alone, so the same function handles both the text protocol
//! (everything arrives as `Value::Bytes`) and the binary protocol used by
//! prepared statements.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use mysql_async::Value;
use sync_core::{UniversalType, UniversalValue};
use thiserror::Error;

/// Error during MySQL value conversion.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Type mismatch: expected {expected}, got {actual:?}")]
    TypeMismatch { expected: String, actual: Value },
    #[error("Invalid UTF-8 in string: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("Invalid date/time value: {0}")]
    InvalidDateTime(String),
    #[error("Value out of range for {target}: {value}")]
    OutOfRange { target: &'static str, value: String },
    #[error("Invalid UUID: {0}")]
    InvalidUuid(String),
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Convert a MySQL value of a column with the given type.
///
/// MySQL zero dates (`0000-00-00`) have no calendar meaning and become NULL.
pub fn mysql_value_to_universal(
    value: Value,
    column_type: &UniversalType,
) -> Result<UniversalValue, ConversionError> {
    if matches!(value, Value::NULL) {
        return Ok(UniversalValue::Null);
    }

    let converted = match column_type {
        UniversalType::Bool => UniversalValue::Bool(extract_bool(&value)?),
        UniversalType::Int8 { .. } | UniversalType::Int16 | UniversalType::Int32 => {
            let i = extract_int(&value)?;
            let narrowed = i32::try_from(i).map_err(|_| ConversionError::OutOfRange {
                target: "int32",
                value: i.to_string(),
            })?;
            UniversalValue::Int32(narrowed)
        }
        UniversalType::Int64 => UniversalValue::Int64(extract_int(&value)?),
        UniversalType::Float32 => match value {
            Value::Float(f) => UniversalValue::Float32(f),
            other => UniversalValue::Float64(extract_float(&other)?),
        },
        UniversalType::Float64 => UniversalValue::Float64(extract_float(&value)?),
        UniversalType::Decimal { .. } => UniversalValue::Decimal(extract_string(&value)?),
        UniversalType::Char { .. }
        | UniversalType::VarChar { .. }
        | UniversalType::Text
        | UniversalType::Enum { .. }
        | UniversalType::Set { .. } => UniversalValue::Text(extract_string(&value)?),
        UniversalType::Bytes => UniversalValue::Bytes(extract_bytes(&value)?),
        UniversalType::Date => match extract_datetime(&value)? {
            Some(dt) => UniversalValue::Date(dt.date()),
            None => UniversalValue::Null,
        },
        UniversalType::Time => UniversalValue::Time(extract_time(&value)?),
        UniversalType::LocalDateTime | UniversalType::ZonedDateTime => {
            match extract_datetime(&value)? {
                Some(dt) => UniversalValue::LocalDateTime(dt),
                None => UniversalValue::Null,
            }
        }
        UniversalType::Uuid => UniversalValue::Uuid(extract_uuid(&value)?),
        UniversalType::Json => {
            let s = extract_string(&value)?;
            UniversalValue::Json(serde_json::from_str(&s)?)
        }
    };
    Ok(converted)
}

fn mismatch(expected: &str, value: &Value) -> ConversionError {
    ConversionError::TypeMismatch {
        expected: expected.to_string(),
        actual: value.clone(),
    }
}

fn extract_bool(value: &Value) -> Result<bool, ConversionError> {
    match value {
        Value::Int(i) => Ok(*i != 0),
        Value::UInt(u) => Ok(*u != 0),
        // BIT(1) arrives as a single raw byte
        Value::Bytes(b) if b.len() == 1 && b[0] <= 1 => Ok(b[0] == 1),
        Value::Bytes(_) => Ok(extract_int(value)? != 0),
        _ => Err(mismatch("boolean", value)),
    }
}

fn extract_int(value: &Value) -> Result<i64, ConversionError> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::UInt(u) => i64::try_from(*u).map_err(|_| ConversionError::OutOfRange {
            target: "int64",
            value: u.to_string(),
        }),
        Value::Bytes(b) => {
            let s = String::from_utf8(b.clone())?;
            s.trim().parse().map_err(|_| mismatch("integer", value))
        }
        _ => Err(mismatch("integer", value)),
    }
}

fn extract_float(value: &Value) -> Result<f64, ConversionError> {
    match value {
        Value::Float(f) => Ok(*f as f64),
        Value::Double(d) => Ok(*d),
        Value::Int(i) => Ok(*i as f64),
        Value::UInt(u) => Ok(*u as f64),
        Value::Bytes(b) => {
            let s = String::from_utf8(b.clone())?;
            s.trim().parse().map_err(|_| mismatch("float", value))
        }
        _ => Err(mismatch("float", value)),
    }
}

fn extract_string(value: &Value) -> Result<String, ConversionError> {
    match value {
        Value::Bytes(b) => Ok(String::from_utf8(b.clone())?),
        Value::Int(i) => Ok(i.to_string()),
        Value::UInt(u) => Ok(u.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Double(d) => Ok(d.to_string()),
        _ => Err(mismatch("string", value)),
    }
}

fn extract_bytes(value: &Value) -> Result<Vec<u8>, ConversionError> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        _ => Err(mismatch("bytes", value)),
    }
}

/// Returns `None` for zero dates.
fn extract_datetime(value: &Value) -> Result<Option<NaiveDateTime>, ConversionError> {
    match value {
        Value::Date(0, 0, 0, ..) => Ok(None),
        Value::Date(year, month, day, hour, min, sec, micro) => {
            let date = NaiveDate::from_ymd_opt(*year as i32, *month as u32, *day as u32);
            let time =
                NaiveTime::from_hms_micro_opt(*hour as u32, *min as u32, *sec as u32, *micro);
            match (date, time) {
                (Some(d), Some(t)) => Ok(Some(NaiveDateTime::new(d, t))),
                _ => Err(ConversionError::InvalidDateTime(format!("{value:?}"))),
            }
        }
        Value::Bytes(b) => {
            let s = String::from_utf8(b.clone())?;
            if s.starts_with("0000-00-00") {
                return Ok(None);
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f") {
                return Ok(Some(dt));
            }
            if let Ok(d) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
                return Ok(Some(d.and_time(NaiveTime::MIN)));
            }
            Err(ConversionError::InvalidDateTime(s))
        }
        _ => Err(mismatch("datetime", value)),
    }
}

/// MySQL TIME spans -838:59:59..838:59:59; only time-of-day values convert.
fn extract_time(value: &Value) -> Result<NaiveTime, ConversionError> {
    match value {
        Value::Time(false, 0, hour, min, sec, micro) => {
            NaiveTime::from_hms_micro_opt(*hour as u32, *min as u32, *sec as u32, *micro)
                .ok_or_else(|| ConversionError::InvalidDateTime(format!("{value:?}")))
        }
        Value::Time(..) => Err(ConversionError::OutOfRange {
            target: "time of day",
            value: format!("{value:?}"),
        }),
        Value::Bytes(b) => {
            let s = String::from_utf8(b.clone())?;
            NaiveTime::parse_from_str(&s, "%H:%M:%S%.f").map_err(|_| {
                ConversionError::OutOfRange {
                    target: "time of day",
                    value: s,
                }
            })
        }
        _ => Err(mismatch("time", value)),
    }
}

fn extract_uuid(value: &Value) -> Result<uuid::Uuid, ConversionError> {
    match value {
        Value::Bytes(b) if b.len() == 16 => uuid::Uuid::from_slice(b)
            .map_err(|e| ConversionError::InvalidUuid(e.to_string())),
        Value::Bytes(b) => {
            let s = String::from_utf8(b.clone())?;
            uuid::Uuid::parse_str(&s).map_err(|_| ConversionError::InvalidUuid(s))
        }
        _ => Err(mismatch("uuid", value)),
    }
}
