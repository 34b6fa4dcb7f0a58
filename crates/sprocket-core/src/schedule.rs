//! Crontab schedules bound to a timezone.
//!
//! Expressions use the classic five fields (`min hour dom month dow`, with
//! `0` or `7` meaning Sunday). Six- and seven-field expressions with a leading
//! seconds field are passed to the `cron` parser unchanged.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::error::{ConfigurationError, ConfigurationResult};

const WEEKDAYS: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

/// A parsed cron schedule evaluated in a fixed timezone.
#[derive(Clone)]
pub struct CrontabSchedule {
    expression: String,
    schedule: Schedule,
    timezone: Tz,
    /// Five-field expressions tick once per minute.
    per_minute: bool,
}

impl CrontabSchedule {
    /// Parses `expression` in `timezone` (an IANA name; UTC when `None`).
    pub fn parse(expression: &str, timezone: Option<&str>) -> ConfigurationResult<Self> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(ConfigurationError::MissingField("crontab"));
        }

        let timezone = match timezone.map(str::trim).filter(|tz| !tz.is_empty()) {
            Some(name) => Tz::from_str(name)
                .map_err(|_| ConfigurationError::InvalidTimezone(name.to_string()))?,
            None => Tz::UTC,
        };

        let per_minute = expression.split_whitespace().count() == 5;
        let normalized = normalize(expression)?;
        let schedule = Schedule::from_str(&normalized)
            .map_err(|e| ConfigurationError::crontab(expression, e))?;

        Ok(Self {
            expression: expression.to_string(),
            schedule,
            timezone,
            per_minute,
        })
    }

    /// The expression as written at registration.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The timezone the schedule is evaluated in.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// The scheduled tick `fire_time` belongs to.
    ///
    /// Five-field schedules truncate to the minute, schedules with a seconds
    /// field to the second.
    pub fn tick(&self, fire_time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let tick = fire_time.with_nanosecond(0)?;
        if self.per_minute {
            tick.with_second(0)
        } else {
            Some(tick)
        }
    }

    /// Returns the tick, in the schedule's timezone, if `fire_time` is an
    /// occurrence of this schedule.
    pub fn occurrence(&self, fire_time: DateTime<Utc>) -> Option<DateTime<Tz>> {
        let tick = self.tick(fire_time)?.with_timezone(&self.timezone);
        let probe = tick - TimeDelta::seconds(1);
        self.schedule.after(&probe).next().filter(|next| *next == tick)
    }

    /// Returns the next occurrence strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&after.with_timezone(&self.timezone))
            .next()
            .map(|t| t.with_timezone(&Utc))
    }
}

impl fmt::Debug for CrontabSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrontabSchedule")
            .field("expression", &self.expression)
            .field("timezone", &self.timezone.name())
            .finish()
    }
}

/// Converts a five-field expression into the `cron` crate's syntax.
fn normalize(expression: &str) -> ConfigurationResult<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.len() {
        5 => {
            let dow = weekday_field(fields[4])
                .ok_or_else(|| ConfigurationError::crontab(expression, "invalid day-of-week"))?;
            Ok(format!(
                "0 {} {} {} {} {}",
                fields[0], fields[1], fields[2], fields[3], dow
            ))
        }
        6 | 7 => Ok(fields.join(" ")),
        n => Err(ConfigurationError::crontab(
            expression,
            format!("expected 5, 6 or 7 fields, got {n}"),
        )),
    }
}

/// Rewrites numeric weekdays (0-7, Sunday = 0 or 7) as names, leaving steps alone.
fn weekday_field(field: &str) -> Option<String> {
    let mut items = Vec::new();
    for item in field.split(',') {
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => (base, Some(step)),
            None => (item, None),
        };
        let base = base
            .split('-')
            .map(|part| match part.parse::<usize>() {
                Ok(n) => WEEKDAYS.get(n).map(|name| name.to_string()),
                Err(_) => Some(part.to_string()),
            })
            .collect::<Option<Vec<_>>>()?
            .join("-");
        items.push(match step {
            Some(step) => format!("{base}/{step}"),
            None => base,
        });
    }
    Some(items.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_every_five_minutes() {
        let schedule = CrontabSchedule::parse("*/5 * * * *", None).unwrap();
        assert!(schedule.occurrence(utc(2024, 5, 1, 12, 10, 0)).is_some());
        assert!(schedule.occurrence(utc(2024, 5, 1, 12, 11, 0)).is_none());
        // A late timer still lands on the minute's tick.
        let late = schedule.occurrence(utc(2024, 5, 1, 12, 10, 30)).unwrap();
        assert_eq!(late, utc(2024, 5, 1, 12, 10, 0));
        assert!(schedule.occurrence(utc(2024, 5, 1, 12, 11, 59)).is_none());
    }

    #[test]
    fn test_sunday_as_zero_and_seven() {
        // 2024-05-05 is a Sunday.
        let sunday = utc(2024, 5, 5, 2, 0, 0);
        for expr in ["0 2 * * 0", "0 2 * * 7", "0 2 * * SUN"] {
            let schedule = CrontabSchedule::parse(expr, None).unwrap();
            assert!(schedule.occurrence(sunday).is_some(), "{expr}");
        }
        let weekdays = CrontabSchedule::parse("0 2 * * 1-5", None).unwrap();
        assert!(weekdays.occurrence(sunday).is_none());
        assert!(weekdays.occurrence(utc(2024, 5, 6, 2, 0, 0)).is_some());
    }

    #[test]
    fn test_timezone_shifts_the_tick() {
        let schedule = CrontabSchedule::parse("0 9 * * *", Some("Europe/London")).unwrap();
        // 09:00 BST is 08:00 UTC in May.
        assert!(schedule.occurrence(utc(2024, 5, 1, 8, 0, 0)).is_some());
        assert!(schedule.occurrence(utc(2024, 5, 1, 9, 0, 0)).is_none());
    }

    #[test]
    fn test_seconds_field_is_accepted() {
        let schedule = CrontabSchedule::parse("30 * * * * *", None).unwrap();
        assert!(schedule.occurrence(utc(2024, 5, 1, 12, 0, 30)).is_some());
        assert!(schedule.occurrence(utc(2024, 5, 1, 12, 0, 31)).is_none());
        assert_eq!(
            schedule.tick(utc(2024, 5, 1, 12, 0, 31)),
            Some(utc(2024, 5, 1, 12, 0, 31))
        );
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(matches!(
            CrontabSchedule::parse("not a cron", None),
            Err(ConfigurationError::InvalidCrontab { .. })
        ));
        assert!(matches!(
            CrontabSchedule::parse("61 * * * *", None),
            Err(ConfigurationError::InvalidCrontab { .. })
        ));
        assert!(matches!(
            CrontabSchedule::parse("* * * * 9", None),
            Err(ConfigurationError::InvalidCrontab { .. })
        ));
        assert!(matches!(
            CrontabSchedule::parse("* * * * *", Some("Mars/Olympus")),
            Err(ConfigurationError::InvalidTimezone(_))
        ));
    }

    #[test]
    fn test_next_after() {
        let schedule = CrontabSchedule::parse("*/5 * * * *", None).unwrap();
        let next = schedule.next_after(utc(2024, 5, 1, 12, 11, 0)).unwrap();
        assert_eq!(next, utc(2024, 5, 1, 12, 15, 0));
    }
}
