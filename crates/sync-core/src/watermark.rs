//! Watermark values: the high-water mark of an incremental column.

use crate::values::UniversalValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Interprets a wall-clock time in `tz` as a UTC instant.
///
/// Ambiguous times (DST fall-back) resolve to the earliest instant. Times
/// inside a DST gap use the offset in effect at the same UTC instant.
pub fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.with_timezone(&Utc),
        None => {
            let offset = tz.offset_from_utc_datetime(&naive).fix().local_minus_utc();
            Utc.from_utc_datetime(&(naive - chrono::Duration::seconds(i64::from(offset))))
        }
    }
}

/// The greatest incremental-column value durably loaded for a mapping.
///
/// Timestamps are always stored as UTC instants. Naive source timestamps are
/// converted with the source zone on the way in and back on the way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WatermarkValue {
    Timestamp(DateTime<Utc>),
    /// Wide enough for `BIGINT UNSIGNED` and whole decimals
    Integer(i128),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WatermarkError {
    #[error("Cannot parse '{0}' as a timestamp or integer watermark")]
    Unparseable(String),

    #[error("Value of type {0} cannot be used as a watermark")]
    UnsupportedValue(&'static str),
}

impl PartialOrd for WatermarkValue {
    /// Watermarks of different kinds are not comparable.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl WatermarkValue {
    /// Parses a user-supplied bound.
    ///
    /// Accepts integers, RFC 3339 instants, naive `YYYY-MM-DD[ T]HH:MM:SS[.f]`
    /// timestamps and bare dates. Naive forms are read in `tz`.
    pub fn parse(input: &str, tz: Tz) -> Result<Self, WatermarkError> {
        let s = input.trim();
        if let Ok(n) = s.parse::<i128>() {
            return Ok(Self::Integer(n));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self::Timestamp(dt.with_timezone(&Utc)));
        }
        for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Self::from_local(naive, tz);
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Self::from_local(date.and_time(chrono::NaiveTime::MIN), tz);
        }
        Err(WatermarkError::Unparseable(input.to_string()))
    }

    /// Converts a wall-clock time in `tz` to a UTC watermark.
    pub fn from_local(naive: NaiveDateTime, tz: Tz) -> Result<Self, WatermarkError> {
        Ok(Self::Timestamp(local_to_utc(naive, tz)))
    }

    /// Builds a watermark from an extracted incremental-column value.
    /// Returns `Ok(None)` for NULL.
    pub fn from_value(value: &UniversalValue, tz: Tz) -> Result<Option<Self>, WatermarkError> {
        let wm = match value {
            UniversalValue::Null => return Ok(None),
            UniversalValue::Int32(_) | UniversalValue::Int64(_) | UniversalValue::Decimal(_) => {
                match value.as_integer() {
                    Some(n) => Self::Integer(n),
                    None => return Err(WatermarkError::UnsupportedValue(value.type_name())),
                }
            }
            UniversalValue::ZonedDateTime(dt) => Self::Timestamp(*dt),
            UniversalValue::LocalDateTime(naive) => Self::from_local(*naive, tz)?,
            UniversalValue::Date(d) => Self::from_local(d.and_time(chrono::NaiveTime::MIN), tz)?,
            other => return Err(WatermarkError::UnsupportedValue(other.type_name())),
        };
        Ok(Some(wm))
    }

    /// The value to bind when comparing against a source column, expressed
    /// in the source's own representation. Integers beyond `i64` are bound as
    /// whole decimals.
    pub fn to_source_value(&self, tz: Tz) -> UniversalValue {
        match self {
            Self::Integer(n) => match i64::try_from(*n) {
                Ok(n) => UniversalValue::Int64(n),
                Err(_) => UniversalValue::Decimal(n.to_string()),
            },
            Self::Timestamp(dt) => UniversalValue::LocalDateTime(dt.with_timezone(&tz).naive_local()),
        }
    }

    /// Returns the larger of two watermarks. A kind mismatch keeps `self`.
    pub fn max(self, other: Self) -> Self {
        match self.partial_cmp(&other) {
            Some(Ordering::Less) => other,
            _ => self,
        }
    }
}

impl fmt::Display for WatermarkValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timestamp(dt) => write!(f, "{}", dt.to_rfc3339()),
            Self::Integer(n) => write!(f, "{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        let tz: Tz = "UTC".parse().unwrap();
        assert_eq!(
            WatermarkValue::parse("42", tz).unwrap(),
            WatermarkValue::Integer(42)
        );
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(
            WatermarkValue::parse("2024-01-01T10:00:00Z", tz).unwrap(),
            WatermarkValue::Timestamp(expected)
        );
        assert_eq!(
            WatermarkValue::parse("2024-01-01 10:00:00", tz).unwrap(),
            WatermarkValue::Timestamp(expected)
        );
        assert_eq!(
            WatermarkValue::parse("2024-01-01", tz).unwrap(),
            WatermarkValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert!(WatermarkValue::parse("yesterday", tz).is_err());
    }

    #[test]
    fn test_local_source_zone_round_trips_through_utc() {
        let tz: Tz = "Asia/Tokyo".parse().unwrap();
        let naive = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let wm = WatermarkValue::from_value(&UniversalValue::LocalDateTime(naive), tz)
            .unwrap()
            .unwrap();
        assert_eq!(
            wm,
            WatermarkValue::Timestamp(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(wm.to_source_value(tz), UniversalValue::LocalDateTime(naive));
    }

    #[test]
    fn test_dst_gap_does_not_fail() {
        let tz: Tz = "America/New_York".parse().unwrap();
        // 02:30 does not exist on 2024-03-10 in New York
        let naive = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let utc = local_to_utc(naive, tz);
        assert_eq!(utc.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
    }

    #[test]
    fn test_ordering_and_max() {
        let a = WatermarkValue::Integer(5);
        let b = WatermarkValue::Integer(9);
        assert!(a < b);
        assert_eq!(a.max(b), b);
        assert_eq!(b.max(a), b);

        let ts = WatermarkValue::Timestamp(Utc::now());
        assert_eq!(a.partial_cmp(&ts), None);
        assert_eq!(a.max(ts), a);
    }

    #[test]
    fn test_unsigned_bigint_watermarks() {
        let tz = Tz::UTC;
        let max = u64::MAX.to_string();
        let wm = WatermarkValue::from_value(&UniversalValue::Decimal(max.clone()), tz)
            .unwrap()
            .unwrap();
        assert_eq!(wm, WatermarkValue::Integer(i128::from(u64::MAX)));
        assert_eq!(wm.to_source_value(tz), UniversalValue::Decimal(max.clone()));
        assert_eq!(WatermarkValue::parse(&max, tz).unwrap(), wm);
        assert!(WatermarkValue::Integer(i128::from(i64::MAX)) < wm);

        let small = WatermarkValue::from_value(&UniversalValue::Decimal("12.000".into()), tz)
            .unwrap()
            .unwrap();
        assert_eq!(small.to_source_value(tz), UniversalValue::Int64(12));
        assert_eq!(
            WatermarkValue::from_value(&UniversalValue::Decimal("1.5".into()), tz),
            Err(WatermarkError::UnsupportedValue("decimal"))
        );
    }

    #[test]
    fn test_watermark_json_keeps_full_width() {
        let wm = WatermarkValue::Integer(i128::from(u64::MAX));
        let json = serde_json::to_string(&wm).unwrap();
        assert_eq!(json, r#"{"kind":"integer","value":18446744073709551615}"#);
        assert_eq!(serde_json::from_str::<WatermarkValue>(&json).unwrap(), wm);
    }

    #[test]
    fn test_null_and_unsupported_values() {
        let tz = Tz::UTC;
        assert_eq!(WatermarkValue::from_value(&UniversalValue::Null, tz), Ok(None));
        assert_eq!(
            WatermarkValue::from_value(&UniversalValue::Text("x".into()), tz),
            Err(WatermarkError::UnsupportedValue("text"))
        );
    }
}
