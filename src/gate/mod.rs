//! Active-hours gate for sensitive-status notifications.
//!
//! The gate answers one question: is the current local time inside the
//! configured daily window? It only ever applies to the configured sensitive
//! status; all other changes notify regardless of time of day.

use chrono::{DateTime, FixedOffset, Local, NaiveTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_ACTIVE_HOURS: &str = "00:00-23:59";

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("active-hours start must not be after end, got {start}-{end} (overnight windows are unsupported)")]
    Inverted { start: NaiveTime, end: NaiveTime },
}

/// A daily local-time window, `start <= end`. No overnight wraparound: an
/// inverted window is a configuration error, not a window crossing midnight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ActiveWindow {
    /// Full-day window, used whenever the configured string cannot be parsed.
    pub fn full_day() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(23, 59, 0).unwrap(),
        }
    }

    /// Parse `"HH:MM-HH:MM"`. A malformed string (wrong token count, bad time)
    /// is logged and degraded to the full-day default; an inverted window is a
    /// hard error so a misconfiguration cannot silently flip its meaning.
    pub fn parse(raw: &str) -> Result<Self, WindowError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::full_day());
        }

        let parts: Vec<&str> = trimmed.split('-').collect();
        let [start_raw, end_raw] = parts.as_slice() else {
            warn!(active_hours = %raw, default = DEFAULT_ACTIVE_HOURS,
                "Invalid ACTIVE_HOURS format, expected 'HH:MM-HH:MM'; using default");
            return Ok(Self::full_day());
        };

        let start = NaiveTime::parse_from_str(start_raw.trim(), "%H:%M");
        let end = NaiveTime::parse_from_str(end_raw.trim(), "%H:%M");
        let (Ok(start), Ok(end)) = (start, end) else {
            warn!(active_hours = %raw, default = DEFAULT_ACTIVE_HOURS,
                "Unparsable ACTIVE_HOURS time, expected 'HH:MM-HH:MM'; using default");
            return Ok(Self::full_day());
        };

        if start > end {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Inclusive containment of a time of day, equivalent to anchoring start
    /// and end on today's date in the caller's zone (no wraparound).
    pub fn contains(&self, now: NaiveTime) -> bool {
        self.start <= now && now <= self.end
    }
}

impl std::fmt::Display for ActiveWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// Resolve an optional named timezone to a `Tz`, logging the fallback to the
/// process-local zone when the name is unset or unknown.
pub fn resolve_timezone(name: Option<&str>) -> Option<Tz> {
    let name = name?;
    match name.parse::<Tz>() {
        Ok(tz) => Some(tz),
        Err(_) => {
            warn!(timezone = %name, "Unknown timezone, using process-local time");
            None
        }
    }
}

/// Current wall-clock time in the configured zone, or process-local time when
/// no zone resolved.
pub fn local_now(tz: Option<Tz>) -> DateTime<FixedOffset> {
    match tz {
        Some(tz) => Utc::now().with_timezone(&tz).fixed_offset(),
        None => Local::now().fixed_offset(),
    }
}
