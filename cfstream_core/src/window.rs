use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default trailing window queried on every cycle.
pub const DEFAULT_WINDOW_MINUTES: i64 = 30;

/// Half-open time range `[start, end)` passed to the analytics query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl AnalyticsWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The `length` immediately preceding `now`.
    pub fn trailing(now: DateTime<Utc>, length: Duration) -> Self {
        Self {
            start: now - length,
            end: now,
        }
    }

    pub fn ending_now(length: Duration) -> Self {
        Self::trailing(Utc::now(), length)
    }

    pub fn length(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

impl Default for AnalyticsWindow {
    fn default() -> Self {
        Self::ending_now(Duration::minutes(DEFAULT_WINDOW_MINUTES))
    }
}

/// One provider-defined bucket inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub minutes_viewed: u64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, minutes_viewed: u64) -> Self {
        Self {
            timestamp,
            minutes_viewed,
        }
    }
}
