use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A timestamp produced by a deterministic clock.
///
/// Values are nanoseconds since the UNIX epoch and never come from the
/// wall clock inside an execution. All identifier and hash derivations in
/// the coordinator are functions of these values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClockTimestamp {
    nanos: u64,
}

impl ClockTimestamp {
    pub const fn from_unix_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    pub const fn from_unix_seconds(seconds: u64) -> Self {
        Self {
            nanos: seconds * 1_000_000_000,
        }
    }

    pub const fn unix_nanos(&self) -> u64 {
        self.nanos
    }

    pub const fn unix_seconds(&self) -> u64 {
        self.nanos / 1_000_000_000
    }

    pub const fn subsec_nanos(&self) -> u32 {
        (self.nanos % 1_000_000_000) as u32
    }

    pub fn checked_add(&self, duration: Duration) -> Option<Self> {
        self.nanos
            .checked_add(duration.as_nanos() as u64)
            .map(Self::from_unix_nanos)
    }

    /// Nanoseconds elapsed since `earlier`, saturating at zero.
    pub fn duration_since(&self, earlier: ClockTimestamp) -> Duration {
        Duration::from_nanos(self.nanos.saturating_sub(earlier.nanos))
    }

    /// RFC3339 rendering in UTC, e.g. `2024-01-01T00:00:00+00:00`.
    pub fn rfc3339(&self) -> String {
        DateTime::<Utc>::from_timestamp(self.unix_seconds() as i64, self.subsec_nanos())
            .map(|datetime| datetime.to_rfc3339())
            .unwrap_or_default()
    }
}
