//! ISO 8601 time dimension decoding and freshness evaluation.

use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const SECS_PER_MINUTE: i64 = 60;
pub const SECS_PER_HOUR: i64 = 60 * SECS_PER_MINUTE;
pub const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;
/// Months are approximated, not calendar accurate.
pub const SECS_PER_MONTH: i64 = 30 * SECS_PER_DAY;
/// Years are approximated, not calendar accurate.
pub const SECS_PER_YEAR: i64 = 364 * SECS_PER_DAY;

/// Parse a timestamp as services publish them.
///
/// Accepts RFC 3339 (with or without fractional seconds), a naive
/// `YYYY-MM-DDTHH:MM:SS` taken as UTC, a bare date, and the compact
/// `YYYYMMDD.HHMMSS` / `YYYYMMDDTHHMMSS` forms used by REST services.
pub fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y%m%d.%H%M%S",
        "%Y%m%dT%H%M%S",
    ] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }
    NaiveDateTime::parse_from_str(&format!("{}T00:00:00", s), "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

pub fn format_iso8601(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Decode an ISO 8601 period token (e.g. `PT1H41M`) into seconds.
///
/// The token must start with 'P', otherwise the result is zero. Digits
/// accumulate until a unit letter consumes them; 'T' switches from date
/// units to time units. Anything else (including a decimal point) is
/// skipped.
pub fn period_seconds(token: &str) -> i64 {
    let token = token.trim();
    if !token.starts_with('P') {
        return 0;
    }
    let mut total: i64 = 0;
    let mut pending: i64 = 0;
    let mut time_units = false;
    for c in token.chars().skip(1) {
        if c == 'T' {
            time_units = true;
            continue;
        }
        if let Some(digit) = c.to_digit(10) {
            pending = pending.saturating_mul(10).saturating_add(digit as i64);
            continue;
        }
        let unit = match (time_units, c) {
            (false, 'D') => SECS_PER_DAY,
            (false, 'M') => SECS_PER_MONTH,
            (false, 'Y') => SECS_PER_YEAR,
            (true, 'H') => SECS_PER_HOUR,
            (true, 'M') => SECS_PER_MINUTE,
            (true, 'S') => 1,
            _ => continue,
        };
        total = total.saturating_add(pending.saturating_mul(unit));
        pending = 0;
    }
    total
}

/// The queryable time range a product advertises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeDimension {
    start: String,
    end: String,
    period_secs: i64,
    min_period_secs: i64,
}

impl TimeDimension {
    /// Parse a `start/end/period` interval or a comma separated list.
    ///
    /// For a list the first value becomes the start, the last the end and the
    /// period stays at the floor. Returns `None` when neither form applies.
    pub fn parse_interval(text: &str, min_period_secs: i64) -> Option<Self> {
        let text = text.trim();
        let parts: Vec<&str> = text.split('/').map(str::trim).collect();
        if parts.len() == 3 {
            return Some(Self {
                start: parts[0].to_string(),
                end: parts[1].to_string(),
                period_secs: period_seconds(parts[2]).max(min_period_secs),
                min_period_secs,
            });
        }
        let values: Vec<&str> = text
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();
        Self::from_values(&values, min_period_secs)
    }

    /// Build from discrete timestamps, oldest first.
    pub fn from_values<S: AsRef<str>>(values: &[S], min_period_secs: i64) -> Option<Self> {
        if values.len() < 2 {
            return None;
        }
        Some(Self {
            start: values[0].as_ref().to_string(),
            end: values[values.len() - 1].as_ref().to_string(),
            period_secs: min_period_secs,
            min_period_secs,
        })
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn end(&self) -> &str {
        &self.end
    }

    pub fn period_secs(&self) -> i64 {
        self.period_secs
    }

    pub fn min_period_secs(&self) -> i64 {
        self.min_period_secs
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        parse_iso8601(&self.end)
    }

    /// Whether a newer instant should be available by now.
    ///
    /// The expected next instant is `end + period`; once that lies at or
    /// before `now - delay` the dimension is stale and its end is advanced by
    /// one period so repeated checks converge. An unparseable end can't be
    /// judged and counts as fresh, as does a period too large to add.
    pub fn is_stale(&mut self, now: DateTime<Utc>, delay_secs: i64) -> bool {
        let Some(end) = self.end_time() else {
            return false;
        };
        let expected = offset_secs(end, self.period_secs);
        let cutoff = delay_secs.checked_neg().and_then(|d| offset_secs(now, d));
        let (Some(expected), Some(cutoff)) = (expected, cutoff) else {
            warn!(
                end = %self.end,
                period_secs = self.period_secs,
                delay_secs,
                "Time dimension out of range, treating as fresh"
            );
            return false;
        };
        if expected <= cutoff {
            self.end = format_iso8601(&expected);
            return true;
        }
        false
    }

    /// The instant to request imagery for.
    ///
    /// With `prefer_current_time` the declared end is stepped back one period
    /// at a time while it is still after `now - delay`, rolling advertised
    /// future instants back to the newest one that should already exist.
    /// If that can't be represented the declared end is used.
    pub fn latest_acceptable_time(
        &self,
        prefer_current_time: bool,
        now: DateTime<Utc>,
        delay_secs: i64,
    ) -> Option<DateTime<Utc>> {
        let end = self.end_time()?;
        if !prefer_current_time || self.period_secs <= 0 {
            return Some(end);
        }
        let Some(cutoff) = delay_secs.checked_neg().and_then(|d| offset_secs(now, d)) else {
            warn!(delay_secs, "Response delay out of range, using declared end");
            return Some(end);
        };
        if end <= cutoff {
            return Some(end);
        }
        // same result as stepping back one period at a time, sub-second
        // excess included
        let excess_ms = (end - cutoff).num_milliseconds();
        let period_ms = self.period_secs.saturating_mul(1000);
        let steps = (excess_ms - 1) / period_ms + 1;
        let rolled = steps
            .checked_mul(period_ms)
            .and_then(Duration::try_milliseconds)
            .and_then(|back| end.checked_sub_signed(back));
        match rolled {
            Some(rolled) => Some(rolled),
            None => {
                warn!(
                    end = %self.end,
                    period_secs = self.period_secs,
                    "Cannot roll back time dimension, using declared end"
                );
                Some(end)
            }
        }
    }
}

/// `t` shifted by `secs`, or `None` when the result leaves chrono's range.
fn offset_secs(t: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(secs).and_then(|d| t.checked_add_signed(d))
}
