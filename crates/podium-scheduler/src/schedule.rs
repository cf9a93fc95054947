//! Next-trigger computation: the weekly target wall-clock time in a named
//! zone, as an absolute UTC instant.

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;

use podium_core::types::ScheduleSpec;

use crate::error::{Result, SchedulerError};

/// Compute the next occurrence of `spec` strictly after `from`.
///
/// The computation is done in the spec's zone on wall-clock values, never by
/// adding fixed UTC durations, so a daylight-saving transition between `from`
/// and the target leaves the intended local hour intact.
///
/// The boundary is inclusive of `from`: if `from` falls exactly on the target
/// wall-clock time, the result is one week later — a trigger never re-fires
/// at the same instant it was computed from.
pub fn next_trigger(from: DateTime<Utc>, spec: &ScheduleSpec) -> Result<DateTime<Utc>> {
    let zone = spec.timezone;
    let local = from.with_timezone(&zone);

    let target_time = NaiveTime::from_hms_opt(spec.hour as u32, spec.minute as u32, 0)
        .ok_or_else(|| {
            SchedulerError::InvalidSchedule(format!(
                "target time {:02}:{:02} out of range",
                spec.hour, spec.minute
            ))
        })?;

    let mut days_ahead =
        (spec.weekday as i64 - local.weekday().num_days_from_monday() as i64).rem_euclid(7);
    if days_ahead == 0 && local.time() >= target_time {
        days_ahead = 7;
    }

    let date = local.date_naive() + Duration::days(days_ahead);
    let mut candidate = resolve_local(zone, date.and_time(target_time))?;

    // Equal-or-before can still happen near a zone transition (the resolved
    // wall time may land earlier in UTC than the naive arithmetic suggests).
    if candidate <= from {
        candidate = resolve_local(zone, (date + Duration::days(7)).and_time(target_time))?;
    }

    Ok(candidate.with_timezone(&Utc))
}

/// Map a naive local datetime onto the zone's timeline.
///
/// Fall-back ambiguity picks the earlier of the two instants. A wall time
/// swallowed by a spring-forward gap is probed forward in 30-minute steps
/// (offsets change by 30 minutes in some zones) until it resolves.
fn resolve_local(zone: Tz, naive: NaiveDateTime) -> Result<DateTime<Tz>> {
    use chrono::offset::LocalResult;

    for step in 0..=8 {
        let probe = naive + Duration::minutes(30 * step);
        match zone.from_local_datetime(&probe) {
            LocalResult::Single(dt) => return Ok(dt),
            LocalResult::Ambiguous(earliest, _) => return Ok(earliest),
            LocalResult::None => continue,
        }
    }

    Err(SchedulerError::InvalidSchedule(format!(
        "local time {naive} cannot be resolved in zone {zone}"
    )))
}
