//! SQLite persistence for group configs and their next triggers.
//!
//! Instants round-trip as RFC 3339 TEXT. A missing database file is simply
//! an empty mapping; an unparseable `next_trigger` surfaces as `None` so the
//! engine treats the entry as stale rather than crashing.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use podium_core::types::{ChannelRef, GroupConfig, GroupId, MarkerRef, ScheduleSpec};

use crate::error::{Result, SchedulerError};

/// One persisted group: config plus the armed trigger, if any.
///
/// `next_trigger == None` means the stored value was missing or unparseable —
/// the engine re-arms such entries without running them.
#[derive(Debug, Clone)]
pub struct StoredGroup {
    pub config: GroupConfig,
    pub next_trigger: Option<DateTime<Utc>>,
}

/// Initialise the schema in `conn`.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout. Ids are
/// TEXT because they arrive as decimal strings from the platform API and
/// may exceed the signed 64-bit range SQLite INTEGERs map onto.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS groups (
            group_id        TEXT    NOT NULL PRIMARY KEY,
            report_channel  TEXT    NOT NULL,
            source_channel  TEXT    NOT NULL,
            marker          TEXT    NOT NULL,
            top_n           INTEGER NOT NULL,
            weekday         INTEGER NOT NULL,   -- 0 = Monday … 6 = Sunday
            hour            INTEGER NOT NULL,
            minute          INTEGER NOT NULL,
            timezone        TEXT    NOT NULL,   -- IANA zone name
            next_trigger    TEXT,               -- RFC 3339 or NULL
            created_at      TEXT    NOT NULL,
            updated_at      TEXT    NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_groups_next_trigger ON groups (next_trigger);
        ",
    )?;
    Ok(())
}

/// Insert or fully replace a group's config, arming `first_trigger`.
///
/// Reconfiguring never merges: every column is overwritten, so a stale
/// partial config cannot survive a reconfigure.
pub fn configure(conn: &Connection, cfg: &GroupConfig, first_trigger: DateTime<Utc>) -> Result<()> {
    cfg.validate()
        .map_err(|e| SchedulerError::InvalidConfig(e.to_string()))?;

    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO groups
         (group_id, report_channel, source_channel, marker, top_n,
          weekday, hour, minute, timezone, next_trigger, created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?11)
         ON CONFLICT(group_id) DO UPDATE SET
            report_channel = excluded.report_channel,
            source_channel = excluded.source_channel,
            marker         = excluded.marker,
            top_n          = excluded.top_n,
            weekday        = excluded.weekday,
            hour           = excluded.hour,
            minute         = excluded.minute,
            timezone       = excluded.timezone,
            next_trigger   = excluded.next_trigger,
            updated_at     = excluded.updated_at",
        params![
            cfg.group.to_string(),
            cfg.report_channel.to_string(),
            cfg.source_channel.to_string(),
            cfg.marker.to_string(),
            cfg.top_n,
            cfg.schedule.weekday,
            cfg.schedule.hour,
            cfg.schedule.minute,
            cfg.schedule.timezone.name(),
            first_trigger.to_rfc3339(),
            now,
        ],
    )?;
    Ok(())
}

/// All configured groups. Rows whose config no longer parses are skipped
/// with a warning rather than failing the whole load.
pub fn load_all(conn: &Connection) -> Result<Vec<StoredGroup>> {
    let mut stmt = conn.prepare(
        "SELECT group_id, report_channel, source_channel, marker, top_n,
                weekday, hour, minute, timezone, next_trigger
         FROM groups ORDER BY group_id",
    )?;

    let rows: Vec<RawRow> = stmt
        .query_map([], row_to_raw)?
        .filter_map(|r| r.ok())
        .collect();

    Ok(rows.into_iter().filter_map(parse_row).collect())
}

/// One group, or `None` when unconfigured.
pub fn get(conn: &Connection, group: GroupId) -> Result<Option<StoredGroup>> {
    let raw = conn
        .query_row(
            "SELECT group_id, report_channel, source_channel, marker, top_n,
                    weekday, hour, minute, timezone, next_trigger
             FROM groups WHERE group_id = ?1",
            [group.to_string()],
            row_to_raw,
        )
        .optional()?;

    Ok(raw.and_then(parse_row))
}

/// Persist a freshly computed trigger. Returns `GroupNotFound` if the group
/// was torn down meanwhile.
pub fn set_next_trigger(conn: &Connection, group: GroupId, at: DateTime<Utc>) -> Result<()> {
    let n = conn.execute(
        "UPDATE groups SET next_trigger = ?2, updated_at = ?3 WHERE group_id = ?1",
        params![group.to_string(), at.to_rfc3339(), Utc::now().to_rfc3339()],
    )?;
    if n == 0 {
        return Err(SchedulerError::GroupNotFound(group));
    }
    Ok(())
}

/// Group teardown. Returns `GroupNotFound` if no row was deleted.
pub fn remove(conn: &Connection, group: GroupId) -> Result<()> {
    let n = conn.execute("DELETE FROM groups WHERE group_id = ?1", [group.to_string()])?;
    if n == 0 {
        return Err(SchedulerError::GroupNotFound(group));
    }
    Ok(())
}

// --- row mapping --------------------------------------------------------

type RawRow = (
    String,         // group_id
    String,         // report_channel
    String,         // source_channel
    String,         // marker
    u32,            // top_n
    u8,             // weekday
    u8,             // hour
    u8,             // minute
    String,         // timezone
    Option<String>, // next_trigger
);

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn parse_row(raw: RawRow) -> Option<StoredGroup> {
    let (group_id, report, source, marker, top_n, weekday, hour, minute, tz_name, next) = raw;

    let group: u64 = match group_id.parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(%group_id, "skipping group row with unparseable id");
            return None;
        }
    };
    let parse_ref = |s: &str| s.parse::<u64>().ok();
    let (Some(report), Some(source), Some(marker_id)) = (
        parse_ref(&report),
        parse_ref(&source),
        parse_ref(&marker),
    ) else {
        warn!(group = %group_id, "skipping group row with unparseable channel/marker ids");
        return None;
    };
    let Ok(timezone) = Tz::from_str(&tz_name) else {
        warn!(group = %group_id, zone = %tz_name, "skipping group row with unknown timezone");
        return None;
    };
    let Ok(schedule) = ScheduleSpec::new(weekday, hour, minute, timezone) else {
        warn!(group = %group_id, "skipping group row with out-of-range schedule");
        return None;
    };

    // An unparseable trigger is stale, not fatal — the engine re-arms it.
    let next_trigger = next
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Some(StoredGroup {
        config: GroupConfig {
            group: GroupId(group),
            report_channel: ChannelRef(report),
            source_channel: ChannelRef(source),
            marker: MarkerRef(marker_id),
            top_n,
            schedule,
        },
        next_trigger,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn mem() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn
    }

    fn cfg(group: u64) -> GroupConfig {
        GroupConfig {
            group: GroupId(group),
            report_channel: ChannelRef(100),
            source_channel: ChannelRef(200),
            marker: MarkerRef(300),
            top_n: 3,
            schedule: ScheduleSpec::new(6, 10, 0, chrono_tz::Asia::Kolkata).unwrap(),
        }
    }

    #[test]
    fn fresh_database_is_an_empty_mapping() {
        let conn = mem();
        assert!(load_all(&conn).unwrap().is_empty());
        assert!(get(&conn, GroupId(1)).unwrap().is_none());
    }

    #[test]
    fn configure_round_trips_losslessly() {
        let conn = mem();
        let trigger = Utc.with_ymd_and_hms(2025, 6, 8, 4, 30, 0).unwrap();
        configure(&conn, &cfg(42), trigger).unwrap();

        let stored = get(&conn, GroupId(42)).unwrap().unwrap();
        assert_eq!(stored.config.group, GroupId(42));
        assert_eq!(stored.config.top_n, 3);
        assert_eq!(stored.config.schedule.timezone, chrono_tz::Asia::Kolkata);
        assert_eq!(stored.next_trigger, Some(trigger));
    }

    #[test]
    fn reconfigure_replaces_the_whole_row() {
        let conn = mem();
        let t1 = Utc.with_ymd_and_hms(2025, 6, 8, 4, 30, 0).unwrap();
        configure(&conn, &cfg(42), t1).unwrap();

        let mut updated = cfg(42);
        updated.top_n = 10;
        updated.marker = MarkerRef(999);
        let t2 = Utc.with_ymd_and_hms(2025, 6, 15, 4, 30, 0).unwrap();
        configure(&conn, &updated, t2).unwrap();

        let all = load_all(&conn).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].config.top_n, 10);
        assert_eq!(all[0].config.marker, MarkerRef(999));
        assert_eq!(all[0].next_trigger, Some(t2));
    }

    #[test]
    fn configure_rejects_invalid_top_n() {
        let conn = mem();
        let mut bad = cfg(1);
        bad.top_n = 0;
        let err = configure(&conn, &bad, Utc::now()).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfig(_)));
    }

    #[test]
    fn unparseable_trigger_reads_back_as_stale() {
        let conn = mem();
        configure(&conn, &cfg(7), Utc::now()).unwrap();
        conn.execute(
            "UPDATE groups SET next_trigger = 'not-a-timestamp' WHERE group_id = '7'",
            [],
        )
        .unwrap();

        let stored = get(&conn, GroupId(7)).unwrap().unwrap();
        assert!(stored.next_trigger.is_none());
    }

    #[test]
    fn set_next_trigger_and_remove_report_missing_groups() {
        let conn = mem();
        let err = set_next_trigger(&conn, GroupId(5), Utc::now()).unwrap_err();
        assert!(matches!(err, SchedulerError::GroupNotFound(_)));
        let err = remove(&conn, GroupId(5)).unwrap_err();
        assert!(matches!(err, SchedulerError::GroupNotFound(_)));

        configure(&conn, &cfg(5), Utc::now()).unwrap();
        set_next_trigger(&conn, GroupId(5), Utc::now()).unwrap();
        remove(&conn, GroupId(5)).unwrap();
        assert!(get(&conn, GroupId(5)).unwrap().is_none());
    }
}
