// Wattsim - Energy consumption telemetry simulator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Temporal context and clocks
//!
//! Suggestions adapt to the season, the time of day and the weekday. All of
//! that is derived from an injected wall-clock time, never from an ambient
//! clock read, so the same instant always yields the same flags.

use chrono::{DateTime, Datelike, FixedOffset, Local, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Season and time-of-day flags (northern hemisphere)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalContext {
    /// June to September
    pub is_summer: bool,
    /// December to March
    pub is_winter: bool,
    /// 20:00 to 06:59
    pub is_night: bool,
    /// Saturday or Sunday
    pub is_weekend: bool,
}

impl TemporalContext {
    /// Flags for a local wall-clock time
    pub fn at<T: Datelike + Timelike>(time: &T) -> Self {
        let month = time.month();
        let hour = time.hour();
        Self {
            is_summer: (6..=9).contains(&month),
            is_winter: month == 12 || month <= 3,
            is_night: hour >= 20 || hour <= 6,
            is_weekend: matches!(time.weekday(), Weekday::Sat | Weekday::Sun),
        }
    }
}

/// Source of the current time
///
/// Returns local wall-clock time with its offset: the offset-free fields feed
/// [`TemporalContext`], the instant becomes record timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    /// Current instant in UTC
    fn now_utc(&self) -> DateTime<Utc> {
        self.now().with_timezone(&Utc)
    }

    /// Temporal context at the current time
    fn context(&self) -> TemporalContext {
        TemporalContext::at(&self.now())
    }
}

/// System local time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Clock frozen at a given time, for tests and replays
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl FixedClock {
    /// Parse an RFC 3339 timestamp, e.g. `2024-07-06T22:15:00+02:00`
    pub fn parse(rfc3339: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(rfc3339).map(Self)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}
