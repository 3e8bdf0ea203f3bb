//! 5-field minute/hour/day-of-month/month/day-of-week cron evaluator.
//!
//! Adapted from the gateway's timezone-aware scheduler down to the
//! UTC-only case this workspace needs — the Appliance always schedules
//! in the adaptor process's own clock, so there is no per-schedule
//! timezone to track, and no DST-gap/ambiguity handling to carry over.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minute: Vec<u32>,
    hour: Vec<u32>,
    dom: Vec<u32>,
    month: Vec<u32>,
    dow: Vec<u32>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid cron expression: {0}")]
pub struct CronParseError(pub String);

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self, CronParseError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronParseError(format!(
                "expected 5 fields, got {}",
                fields.len()
            )));
        }
        Ok(Self {
            minute: parse_field(fields[0], 0, 59)?,
            hour: parse_field(fields[1], 0, 23)?,
            dom: parse_field(fields[2], 1, 31)?,
            month: parse_field(fields[3], 1, 12)?,
            dow: parse_field(fields[4], 0, 6)?,
        })
    }

    pub fn matches(&self, dt: &DateTime<Utc>) -> bool {
        self.minute.contains(&dt.minute())
            && self.hour.contains(&dt.hour())
            && self.dom.contains(&dt.day())
            && self.month.contains(&dt.month())
            && self.dow.contains(&(dt.weekday().num_days_from_sunday()))
    }

    /// First matching minute strictly after `from`, searched minute by
    /// minute up to two years out. Two years bounds the search even for
    /// a field combination (e.g. Feb 30th) that can never match.
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = truncate_to_minute(from) + Duration::minutes(1);
        let limit = start + Duration::days(366 * 2);
        let mut candidate = start;
        while candidate < limit {
            if self.matches(&candidate) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }
        None
    }

    pub fn next_n_after(&self, from: DateTime<Utc>, n: usize) -> Vec<DateTime<Utc>> {
        let mut out = Vec::with_capacity(n);
        let mut cursor = from;
        while out.len() < n {
            match self.next_after(cursor) {
                Some(next) => {
                    cursor = next;
                    out.push(next);
                }
                None => break,
            }
        }
        out
    }
}

fn truncate_to_minute(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt - Duration::seconds(dt.second() as i64) - Duration::nanoseconds(dt.nanosecond() as i64)
}

fn parse_field(field: &str, min: u32, max: u32) -> Result<Vec<u32>, CronParseError> {
    let mut values = std::collections::BTreeSet::new();
    for part in field.split(',') {
        parse_field_part(part, min, max, &mut values)?;
    }
    if values.is_empty() {
        return Err(CronParseError(format!("empty field: {field}")));
    }
    Ok(values.into_iter().collect())
}

fn parse_field_part(
    part: &str,
    min: u32,
    max: u32,
    out: &mut std::collections::BTreeSet<u32>,
) -> Result<(), CronParseError> {
    let (range_part, step) = match part.split_once('/') {
        Some((r, s)) => (
            r,
            Some(
                s.parse::<u32>()
                    .map_err(|_| CronParseError(format!("bad step: {part}")))?,
            ),
        ),
        None => (part, None),
    };

    let (lo, hi) = if range_part == "*" {
        (min, max)
    } else if let Some((a, b)) = range_part.split_once('-') {
        let lo = a
            .parse::<u32>()
            .map_err(|_| CronParseError(format!("bad range: {part}")))?;
        let hi = b
            .parse::<u32>()
            .map_err(|_| CronParseError(format!("bad range: {part}")))?;
        (lo, hi)
    } else {
        let v = range_part
            .parse::<u32>()
            .map_err(|_| CronParseError(format!("bad value: {part}")))?;
        (v, v)
    };

    if lo > hi || lo < min || hi > max {
        return Err(CronParseError(format!("out of range: {part}")));
    }

    let step = step.unwrap_or(1).max(1);
    let mut v = lo;
    while v <= hi {
        out.insert(v);
        v += step;
    }
    Ok(())
}
