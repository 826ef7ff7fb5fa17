//! Cron scheduling.
//!
//! Standard five-field expressions `minute hour day-of-month month
//! day-of-week`. Each field takes `*`, numbers, ranges `a-b`, steps `*/n` or
//! `a-b/n`, and comma-separated lists of those. Months and weekdays also
//! accept three-letter names; weekday 7 is Sunday. When both day fields are
//! restricted a day matches if either does. Times are UTC.

use anyhow::{Context, Result};
use chrono::{
    DateTime, Datelike, Duration as ChronoDuration, DurationRound, NaiveTime, TimeZone, Timelike,
    Utc,
};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAYS: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Days searched for the next fire time. Covers the longest gap between
/// two February 29ths.
const SEARCH_DAYS: i64 = 8 * 366;

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
}

const MINUTE: FieldSpec = FieldSpec { name: "minute", min: 0, max: 59, names: &[] };
const HOUR: FieldSpec = FieldSpec { name: "hour", min: 0, max: 23, names: &[] };
const DAY_OF_MONTH: FieldSpec = FieldSpec { name: "day of month", min: 1, max: 31, names: &[] };
const MONTH: FieldSpec = FieldSpec { name: "month", min: 1, max: 12, names: &MONTHS };
// 7 is folded onto 0 after parsing.
const DAY_OF_WEEK: FieldSpec = FieldSpec { name: "day of week", min: 0, max: 7, names: &WEEKDAYS };

/// The set of values a field matches, one bit per value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Field {
    bits: u64,
    /// Written with a leading `*`
    unrestricted: bool,
}

impl Field {
    fn parse(s: &str, spec: &FieldSpec) -> Result<Self> {
        let mut bits = 0u64;
        for item in s.split(',') {
            bits |= Self::parse_item(item, spec)?;
        }
        Ok(Self {
            bits,
            unrestricted: s.starts_with('*'),
        })
    }

    fn parse_item(item: &str, spec: &FieldSpec) -> Result<u64> {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .with_context(|| format!("Invalid cron {} step '{step}'", spec.name))?;
                if step == 0 {
                    anyhow::bail!("Cron {} step must be positive", spec.name);
                }
                (range, Some(step))
            }
            None => (item, None),
        };
        let (start, end) = if range == "*" {
            (spec.min, spec.max)
        } else if let Some((a, b)) = range.split_once('-') {
            (Self::value(a, spec)?, Self::value(b, spec)?)
        } else {
            let start = Self::value(range, spec)?;
            // `a/n` runs from a to the end of the field.
            (start, if step.is_some() { spec.max } else { start })
        };
        if start > end {
            anyhow::bail!("Cron {} range '{range}' is reversed", spec.name);
        }
        let mut bits = 0u64;
        for value in (start..=end).step_by(step.unwrap_or(1) as usize) {
            bits |= 1 << value;
        }
        Ok(bits)
    }

    fn value(s: &str, spec: &FieldSpec) -> Result<u32> {
        let lower = s.to_ascii_lowercase();
        if let Some(index) = spec.names.iter().position(|n| *n == lower) {
            return Ok(index as u32 + spec.min);
        }
        let value: u32 = s
            .parse()
            .with_context(|| format!("Invalid cron {} '{s}'", spec.name))?;
        if value < spec.min || value > spec.max {
            anyhow::bail!(
                "Cron {} {value} is out of range {}-{}",
                spec.name,
                spec.min,
                spec.max
            );
        }
        Ok(value)
    }

    fn matches(&self, value: u32) -> bool {
        self.bits & (1 << value) != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

impl FromStr for CronSchedule {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != 5 {
            anyhow::bail!("Cron must be 'm h dom mon dow', got '{s}'");
        }
        let mut day_of_week = Field::parse(parts[4], &DAY_OF_WEEK)?;
        if day_of_week.matches(7) {
            day_of_week.bits = (day_of_week.bits | 1) & !(1 << 7);
        }
        let schedule = Self {
            expression: parts.join(" "),
            minute: Field::parse(parts[0], &MINUTE)?,
            hour: Field::parse(parts[1], &HOUR)?,
            day_of_month: Field::parse(parts[2], &DAY_OF_MONTH)?,
            month: Field::parse(parts[3], &MONTH)?,
            day_of_week,
        };
        let epoch = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).single();
        if epoch.and_then(|e| schedule.next_after(e)).is_none() {
            anyhow::bail!("Cron '{s}' never fires");
        }
        Ok(schedule)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl CronSchedule {
    fn day_matches(&self, day: &DateTime<Utc>) -> bool {
        if !self.month.matches(day.month()) {
            return false;
        }
        let dom = self.day_of_month.matches(day.day());
        let dow = self.day_of_week.matches(day.weekday().num_days_from_sunday());
        if self.day_of_month.unrestricted || self.day_of_week.unrestricted {
            dom && dow
        } else {
            dom || dow
        }
    }

    /// First fire time strictly after `after`, or `None` when nothing
    /// matches within eight years.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let minute = ChronoDuration::minutes(1);
        let mut candidate = after.duration_trunc(minute).unwrap_or(after) + minute;
        let horizon = candidate + ChronoDuration::days(SEARCH_DAYS);
        while candidate < horizon {
            if !self.day_matches(&candidate) {
                let next_day = candidate.date_naive().succ_opt()?;
                candidate = Utc.from_utc_datetime(&next_day.and_time(NaiveTime::MIN));
                continue;
            }
            if !self.hour.matches(candidate.hour()) {
                candidate = candidate.duration_trunc(ChronoDuration::hours(1)).ok()?
                    + ChronoDuration::hours(1);
                continue;
            }
            if self.minute.matches(candidate.minute()) {
                return Some(candidate);
            }
            candidate += minute;
        }
        None
    }
}

/// Call `job` at every fire time until `shutdown` is cancelled. A run in
/// progress is not interrupted by this loop; the job observes `shutdown`
/// itself.
pub async fn run_scheduled<F, Fut>(
    schedule: CronSchedule,
    shutdown: CancellationToken,
    mut job: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    info!("Starting scheduler with cron '{}' (UTC)", schedule);
    loop {
        let now = Utc::now();
        let Some(next) = schedule.next_after(now) else {
            warn!("Cron '{}' has no upcoming fire time", schedule);
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        info!("Next run at {}", next.to_rfc3339());

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.cancelled() => {
                info!("Scheduler stopped");
                return;
            }
        }
        job().await;
        if shutdown.is_cancelled() {
            info!("Scheduler stopped");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn next(cron: &str, after: DateTime<Utc>) -> DateTime<Utc> {
        cron.parse::<CronSchedule>().unwrap().next_after(after).unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let cron: CronSchedule = "0  2 * * *".parse().unwrap();
        assert_eq!(cron.to_string(), "0 2 * * *");
        assert!("0 2 * * 1".parse::<CronSchedule>().is_ok());
        assert!("*/5 * * * *".parse::<CronSchedule>().is_ok());
        assert!("0 9 1,15 jan-jun MON".parse::<CronSchedule>().is_ok());
        assert!("60 2 * * *".parse::<CronSchedule>().is_err());
        assert!("0 24 * * *".parse::<CronSchedule>().is_err());
        assert!("0 2 0 * *".parse::<CronSchedule>().is_err());
        assert!("0 2 * 13 *".parse::<CronSchedule>().is_err());
        assert!("0 2 * * 8".parse::<CronSchedule>().is_err());
        assert!("0 2 * *".parse::<CronSchedule>().is_err());
        assert!("*/0 * * * *".parse::<CronSchedule>().is_err());
        assert!("0 5-1 * * *".parse::<CronSchedule>().is_err());
        assert!("0 0 31 2 *".parse::<CronSchedule>().is_err());
    }

    #[test]
    fn test_next_daily_fire_time() {
        let cron = "0 2 * * *";
        assert_eq!(next(cron, utc(2024, 3, 1, 1, 59, 30)), utc(2024, 3, 1, 2, 0, 0));
        // Exactly on the fire time moves to the next day.
        assert_eq!(next(cron, utc(2024, 3, 1, 2, 0, 0)), utc(2024, 3, 2, 2, 0, 0));
        assert_eq!(next(cron, utc(2024, 12, 31, 23, 0, 0)), utc(2025, 1, 1, 2, 0, 0));
    }

    #[test]
    fn test_wildcards() {
        assert_eq!(next("15 * * * *", utc(2024, 3, 1, 10, 20, 0)), utc(2024, 3, 1, 11, 15, 0));
        assert_eq!(next("* * * * *", utc(2024, 3, 1, 10, 20, 59)), utc(2024, 3, 1, 10, 21, 0));
    }

    #[test]
    fn test_weekdays_only() {
        // 2024-03-01 is a Friday.
        let cron = "0 2 * * 1-5";
        assert_eq!(next(cron, utc(2024, 3, 1, 1, 0, 0)), utc(2024, 3, 1, 2, 0, 0));
        assert_eq!(next(cron, utc(2024, 3, 1, 2, 0, 0)), utc(2024, 3, 4, 2, 0, 0));
        assert_eq!(next("0 2 * * sat,sun", utc(2024, 3, 1, 3, 0, 0)), utc(2024, 3, 2, 2, 0, 0));
        assert_eq!(next("0 2 * * 7", utc(2024, 3, 1, 3, 0, 0)), utc(2024, 3, 3, 2, 0, 0));
    }

    #[test]
    fn test_steps_and_lists() {
        let cron = "*/20 9-17/4 * * *";
        assert_eq!(next(cron, utc(2024, 3, 1, 9, 45, 0)), utc(2024, 3, 1, 13, 0, 0));
        assert_eq!(next(cron, utc(2024, 3, 1, 17, 40, 0)), utc(2024, 3, 2, 9, 0, 0));
        assert_eq!(next("5,35 * * * *", utc(2024, 3, 1, 9, 5, 0)), utc(2024, 3, 1, 9, 35, 0));
        assert_eq!(next("10/25 * * * *", utc(2024, 3, 1, 9, 36, 0)), utc(2024, 3, 1, 10, 10, 0));
    }

    #[test]
    fn test_month_and_day_of_month() {
        assert_eq!(next("30 6 1 */3 *", utc(2024, 2, 10, 0, 0, 0)), utc(2024, 4, 1, 6, 30, 0));
        assert_eq!(next("0 0 29 feb *", utc(2024, 3, 1, 0, 0, 0)), utc(2028, 2, 29, 0, 0, 0));
    }

    #[test]
    fn test_restricted_day_fields_match_either() {
        // The 15th, or any Monday.
        let cron = "0 0 15 * mon";
        assert_eq!(next(cron, utc(2024, 3, 1, 0, 0, 0)), utc(2024, 3, 4, 0, 0, 0));
        assert_eq!(next(cron, utc(2024, 3, 12, 0, 0, 0)), utc(2024, 3, 15, 0, 0, 0));
        // A starred day of month leaves the weekday in charge.
        assert_eq!(next("0 0 */1 * mon", utc(2024, 3, 1, 0, 0, 0)), utc(2024, 3, 4, 0, 0, 0));
    }

    #[tokio::test]
    async fn test_scheduler_stops_on_shutdown() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let mut calls = 0;
        run_scheduled("* * * * *".parse().unwrap(), shutdown, || {
            calls += 1;
            async {}
        })
        .await;
        assert_eq!(calls, 0);
    }
}
