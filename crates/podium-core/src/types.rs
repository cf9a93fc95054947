use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{PodiumError, Result};

/// Upper bound for `top_n` — a leaderboard larger than this is a config error.
pub const TOP_N_MAX: u32 = 50;

/// An independent tenant (a guild, in the shipped Discord adapter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u64);

/// A member being tallied (message author).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub u64);

/// A channel — either the one being read or the one reported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef(pub u64);

/// The award marker (a role, in the shipped Discord adapter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerRef(pub u64);

macro_rules! id_display {
    ($($t:ty),*) => {$(
        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
        impl From<u64> for $t {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }
    )*};
}
id_display!(GroupId, ParticipantId, ChannelRef, MarkerRef);

/// Weekly target wall-clock time in a named zone.
///
/// Weekday numbering is 0 = Monday … 6 = Sunday, matching chrono's
/// `num_days_from_monday`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    pub timezone: Tz,
}

impl ScheduleSpec {
    pub fn new(weekday: u8, hour: u8, minute: u8, timezone: Tz) -> Result<Self> {
        if weekday > 6 {
            return Err(PodiumError::InvalidSchedule(format!(
                "weekday must be 0-6 (0 = Monday), got {weekday}"
            )));
        }
        if hour > 23 || minute > 59 {
            return Err(PodiumError::InvalidSchedule(format!(
                "target time {hour:02}:{minute:02} out of range"
            )));
        }
        Ok(Self {
            weekday,
            hour,
            minute,
            timezone,
        })
    }

    /// Re-check ranges after deserialization (serde bypasses `new`).
    pub fn validate(&self) -> Result<()> {
        Self::new(self.weekday, self.hour, self.minute, self.timezone).map(|_| ())
    }
}

impl fmt::Display for ScheduleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
        let day = DAYS.get(self.weekday as usize).copied().unwrap_or("?");
        write!(
            f,
            "{day} {:02}:{:02} {}",
            self.hour, self.minute, self.timezone
        )
    }
}

/// Full per-group configuration. Replaced wholesale on reconfigure —
/// never partially mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub group: GroupId,
    /// Where the report is posted.
    pub report_channel: ChannelRef,
    /// Where messages are counted.
    pub source_channel: ChannelRef,
    /// The award marker rotated across the top N.
    pub marker: MarkerRef,
    pub top_n: u32,
    pub schedule: ScheduleSpec,
}

impl GroupConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_n < 1 || self.top_n > TOP_N_MAX {
            return Err(PodiumError::InvalidGroup(format!(
                "top_n must be 1-{TOP_N_MAX}, got {}",
                self.top_n
            )));
        }
        self.schedule.validate()
    }
}

/// One ranked participant with their message count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub participant: ParticipantId,
    pub count: u64,
}

/// Ordered ranking, length ≤ top_n, non-increasing by count, ties broken by
/// first-seen order. Computed per run, never persisted.
pub type TallyResult = Vec<RankedEntry>;

/// The bounded interval a tally covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallyWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TallyWindow {
    /// Trailing window of `days` days ending at `end`.
    pub fn trailing(end: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Minimal membership change taking the previous holder set to the new top N.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationDelta {
    pub to_remove: BTreeSet<ParticipantId>,
    pub to_add: BTreeSet<ParticipantId>,
}

impl RotationDelta {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}
