use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid time of day {0:?}, expected HH:MM")]
pub struct InvalidTime(pub String);

/// Parses a time string (HH:MM) to minutes since midnight
pub fn parse_time_to_minutes(time_str: &str) -> Option<u32> {
    let parts: Vec<&str> = time_str.split(':').collect();
    if parts.len() != 2 {
        return None;
    }
    let hours: u32 = parts[0].parse().ok()?;
    let minutes: u32 = parts[1].parse().ok()?;
    if hours >= 24 || minutes >= 60 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Formats minutes since midnight to time string (HH:MM)
pub fn minutes_to_time_string(minutes: u32) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    format!("{:02}:{:02}", hours % 24, mins)
}

/// Time of day with minute precision, written as zero-padded "HH:MM".
///
/// Ordering is numeric on minutes since midnight, which matches the
/// lexicographic order of the zero-padded string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    /// Builds a time from hours and minutes, wrapping past midnight
    pub const fn from_hm(hours: u32, minutes: u32) -> Self {
        TimeOfDay((hours * 60 + minutes) % MINUTES_PER_DAY)
    }

    /// Minutes since midnight
    pub fn minutes(self) -> u32 {
        self.0
    }

    /// Signed distance in minutes from `self` to `later`
    pub fn minutes_until(self, later: TimeOfDay) -> i64 {
        i64::from(later.0) - i64::from(self.0)
    }
}

impl FromStr for TimeOfDay {
    type Err = InvalidTime;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_time_to_minutes(s.trim())
            .map(TimeOfDay)
            .ok_or_else(|| InvalidTime(s.to_string()))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&minutes_to_time_string(self.0))
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Half-open interval `[start, end)` within a single day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl Interval {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Interval { start, end }
    }

    /// Length in minutes, zero for empty or inverted intervals
    pub fn duration_minutes(&self) -> u32 {
        self.end.minutes().saturating_sub(self.start.minutes())
    }
}

/// Computes the free gaps left in `[window_start, window_end)` by `busy`.
///
/// `busy` must be sorted ascending by start. Overlapping and back-to-back
/// busy intervals merge because the cursor never moves backwards. Gaps are
/// clipped to the window, so busy time starting after `window_end` never
/// produces a slot outside it.
pub fn free_intervals(
    busy: &[Interval],
    window_start: TimeOfDay,
    window_end: TimeOfDay,
) -> Vec<Interval> {
    debug_assert!(
        busy.windows(2).all(|pair| pair[0].start <= pair[1].start),
        "busy intervals must be sorted by start"
    );

    let mut free = Vec::new();
    let mut cursor = window_start;

    for interval in busy {
        if cursor >= window_end {
            break;
        }
        let gap_end = interval.start.min(window_end);
        if gap_end > cursor {
            free.push(Interval::new(cursor, gap_end));
        }
        cursor = cursor.max(interval.end);
    }

    if cursor < window_end {
        free.push(Interval::new(cursor, window_end));
    }

    free
}
