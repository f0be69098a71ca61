//! Timeframe definitions for market data.

use chrono::{DateTime, Datelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Base unit of a timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Every raw update is its own bar
    Tick,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl TimeUnit {
    fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::Tick => "t",
            TimeUnit::Second => "s",
            TimeUnit::Minute => "m",
            TimeUnit::Hour => "h",
            TimeUnit::Day => "d",
            TimeUnit::Week => "w",
            TimeUnit::Month => "M",
        }
    }
}

/// Timeframe of a feed: a base unit and a compression factor
/// (e.g. 5 x Minute for 5-minute bars).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timeframe {
    pub unit: TimeUnit,
    pub compression: u32,
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::days(1)
    }
}

impl Timeframe {
    /// Create a timeframe. A compression of zero is treated as one.
    pub fn new(unit: TimeUnit, compression: u32) -> Self {
        Self {
            unit,
            compression: compression.max(1),
        }
    }

    pub fn ticks(n: u32) -> Self {
        Self::new(TimeUnit::Tick, n)
    }

    pub fn seconds(n: u32) -> Self {
        Self::new(TimeUnit::Second, n)
    }

    pub fn minutes(n: u32) -> Self {
        Self::new(TimeUnit::Minute, n)
    }

    pub fn hours(n: u32) -> Self {
        Self::new(TimeUnit::Hour, n)
    }

    pub fn days(n: u32) -> Self {
        Self::new(TimeUnit::Day, n)
    }

    pub fn weeks(n: u32) -> Self {
        Self::new(TimeUnit::Week, n)
    }

    pub fn months(n: u32) -> Self {
        Self::new(TimeUnit::Month, n)
    }

    /// Fixed duration of one bar in milliseconds, if the unit has one.
    /// Ticks and months have no fixed duration.
    pub fn as_millis(&self) -> Option<i64> {
        let unit = match self.unit {
            TimeUnit::Second => MS_PER_SECOND,
            TimeUnit::Minute => MS_PER_MINUTE,
            TimeUnit::Hour => MS_PER_HOUR,
            TimeUnit::Day => MS_PER_DAY,
            TimeUnit::Week => 7 * MS_PER_DAY,
            TimeUnit::Tick | TimeUnit::Month => return None,
        };
        Some(unit * i64::from(self.compression))
    }

    /// Check if this is an intraday timeframe.
    pub fn is_intraday(&self) -> bool {
        matches!(
            self.unit,
            TimeUnit::Tick | TimeUnit::Second | TimeUnit::Minute | TimeUnit::Hour
        )
    }

    /// Bucket key of the bar of this timeframe containing `timestamp` (ms, UTC).
    ///
    /// Two timestamps share a bucket iff their keys are equal, and keys grow with
    /// time. Weeks start on Monday. Tick timeframes have no time buckets.
    pub fn bucket(&self, timestamp: i64) -> Option<i64> {
        let compression = i64::from(self.compression);
        match self.unit {
            TimeUnit::Tick => None,
            TimeUnit::Week => {
                // 1970-01-01 was a Thursday; shift so weeks begin on Monday.
                let days = timestamp.div_euclid(MS_PER_DAY) + 3;
                Some(days.div_euclid(7).div_euclid(compression))
            }
            TimeUnit::Month => {
                let dt = DateTime::from_timestamp_millis(timestamp)?;
                let months = i64::from(dt.year()) * 12 + i64::from(dt.month0());
                Some(months.div_euclid(compression))
            }
            _ => {
                let width = self.as_millis()?;
                Some(timestamp.div_euclid(width))
            }
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.compression, self.unit.suffix())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("Invalid timeframe: {}", s))?;
        let (digits, unit) = s.split_at(split);
        let compression = if digits.is_empty() {
            1
        } else {
            digits
                .parse::<u32>()
                .map_err(|_| format!("Invalid timeframe: {}", s))?
        };

        // "M" is months; everything else is case-insensitive.
        let unit = match unit {
            "M" | "mo" | "month" | "months" => TimeUnit::Month,
            other => match other.to_lowercase().as_str() {
                "t" | "tick" | "ticks" => TimeUnit::Tick,
                "s" | "sec" | "second" | "seconds" => TimeUnit::Second,
                "m" | "min" | "minute" | "minutes" => TimeUnit::Minute,
                "h" | "hour" | "hours" => TimeUnit::Hour,
                "d" | "day" | "days" | "daily" => TimeUnit::Day,
                "w" | "week" | "weeks" | "weekly" => TimeUnit::Week,
                "monthly" => TimeUnit::Month,
                _ => return Err(format!("Invalid timeframe: {}", s)),
            },
        };
        Ok(Timeframe::new(unit, compression))
    }
}
