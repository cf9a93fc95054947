use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use tokio::sync::watch;
use tracing::{error, info, warn};

use podium_board::{BoardError, JobOutcome};
use podium_core::config::SchedulerConfig;
use podium_core::types::{GroupConfig, GroupId, TallyWindow};

use crate::error::{Result, SchedulerError};
use crate::schedule::next_trigger;
use crate::store::{self, StoredGroup};

/// The end-to-end leaderboard job, injected so the scheduling core carries
/// no I/O of its own. `podium-bot` wires an implementation built from the
/// Discord adapter.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(
        &self,
        cfg: &GroupConfig,
        window: TallyWindow,
    ) -> std::result::Result<JobOutcome, BoardError>;
}

/// Shared handle for group management while the engine loop runs.
///
/// Uses its own `Connection` so callers can configure groups and trigger
/// manual runs without conflicting with the engine's polling queries.
pub struct SchedulerHandle {
    conn: Arc<Mutex<Connection>>,
    window_days: i64,
}

impl SchedulerHandle {
    pub fn new(conn: Connection, cfg: &SchedulerConfig) -> Result<Self> {
        store::init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            window_days: cfg.window_days,
        })
    }

    /// Create or fully replace a group's config and arm its first trigger.
    /// Returns the armed instant.
    pub fn configure(&self, cfg: &GroupConfig, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let first = next_trigger(now, &cfg.schedule)?;
        let conn = self.conn.lock().unwrap();
        store::configure(&conn, cfg, first)?;
        info!(group = %cfg.group, next = %first, "group configured");
        Ok(first)
    }

    /// Group teardown.
    pub fn remove_group(&self, group: GroupId) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        store::remove(&conn, group)?;
        info!(%group, "group removed");
        Ok(())
    }

    pub fn list_groups(&self) -> Result<Vec<StoredGroup>> {
        let conn = self.conn.lock().unwrap();
        store::load_all(&conn)
    }

    /// The armed trigger and the remaining duration until it.
    ///
    /// A missing or already-past trigger is repaired on query: recomputed
    /// from `now` and persisted, the same way the engine would on its next
    /// tick.
    pub fn time_until_next(
        &self,
        group: GroupId,
        now: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, Duration)> {
        let conn = self.conn.lock().unwrap();
        let stored = store::get(&conn, group)?.ok_or(SchedulerError::GroupNotFound(group))?;

        match stored.next_trigger {
            Some(t) if t >= now => Ok((t, t - now)),
            _ => {
                let next = next_trigger(now, &stored.config.schedule)?;
                store::set_next_trigger(&conn, group, next)?;
                warn!(%group, next = %next, "stale trigger repaired on query");
                Ok((next, next - now))
            }
        }
    }

    /// Run the job for `group` immediately, out of band.
    ///
    /// Reschedules exactly like a scheduled run — on success *and* on
    /// failure — then surfaces the job result to the caller, so an
    /// interactive "run it now" reports source-read failures instead of
    /// burying them in the log.
    pub async fn run_now(
        &self,
        group: GroupId,
        runner: &dyn JobRunner,
        now: DateTime<Utc>,
    ) -> Result<(JobOutcome, DateTime<Utc>)> {
        let stored = {
            let conn = self.conn.lock().unwrap();
            store::get(&conn, group)?
        }
        .ok_or(SchedulerError::GroupNotFound(group))?;

        let window = TallyWindow::trailing(now, self.window_days);
        let result = runner.run(&stored.config, window).await;

        let next = next_trigger(now, &stored.config.schedule)?;
        {
            let conn = self.conn.lock().unwrap();
            if let Err(e) = store::set_next_trigger(&conn, group, next) {
                error!(%group, error = %e, "failed to persist next trigger after manual run");
            }
        }

        let outcome = result?;
        Ok((outcome, next))
    }
}

/// Core scheduler: one row per group, coarse polling, always re-armed.
///
/// Groups are processed sequentially within a tick, so two runs for the same
/// group can never overlap. A slow job delays the rest of the tick — the
/// poll interval is coarse enough that this bounded latency is acceptable.
pub struct SchedulerEngine {
    conn: Connection,
    runner: Arc<dyn JobRunner>,
    poll_interval: std::time::Duration,
    window_days: i64,
    /// Triggers whose persist failed. The in-memory value stays
    /// authoritative until the next successful write, so a dead disk can't
    /// re-fire a job every tick.
    overrides: HashMap<GroupId, DateTime<Utc>>,
}

impl SchedulerEngine {
    /// Create a new engine, initialising the DB schema if needed.
    pub fn new(conn: Connection, runner: Arc<dyn JobRunner>, cfg: &SchedulerConfig) -> Result<Self> {
        store::init_db(&conn)?;
        Ok(Self {
            conn,
            runner,
            poll_interval: std::time::Duration::from_secs(cfg.poll_interval_secs),
            window_days: cfg.window_days,
            overrides: HashMap::new(),
        })
    }

    /// Main loop. Polls until `shutdown` broadcasts `true`; the tick in
    /// flight always completes before the loop exits.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(poll_secs = self.poll_interval.as_secs(), "scheduler engine started");
        self.recompute_stale_on_startup(Utc::now());

        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        error!("scheduler tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Re-arm every entry whose trigger is missing or already past.
    ///
    /// Past-due at startup means the process was down across the target
    /// instant (possibly for weeks): that's stale, not due. One future
    /// trigger is computed and nothing runs, so a restart never fires a
    /// backlog. An entry dead on the boundary (`trigger == now`) is still
    /// genuinely due and is left armed for the first tick.
    fn recompute_stale_on_startup(&mut self, now: DateTime<Utc>) {
        let entries = match store::load_all(&self.conn) {
            Ok(entries) => entries,
            Err(e) => {
                error!("startup schedule load failed: {e}");
                return;
            }
        };

        let mut repaired = 0usize;
        for stored in entries {
            let stale = stored.next_trigger.map_or(true, |t| t < now);
            if !stale {
                continue;
            }
            match next_trigger(now, &stored.config.schedule) {
                Ok(next) => {
                    self.arm(stored.config.group, next);
                    repaired += 1;
                }
                Err(e) => {
                    error!(group = %stored.config.group, error = %e, "cannot recompute stale trigger");
                }
            }
        }
        if repaired > 0 {
            warn!(count = repaired, "stale schedules re-armed on startup");
        }
    }

    /// One poll cycle: run every due group, re-arm every stale entry.
    ///
    /// `now >= trigger` is inclusive — a tick landing exactly on the target
    /// instant runs the job. Job failures never propagate; the group is
    /// re-armed either way and retried one full period later.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<()> {
        let entries = store::load_all(&self.conn)?;

        for stored in entries {
            let group = stored.config.group;
            let armed = self
                .overrides
                .get(&group)
                .copied()
                .or(stored.next_trigger);

            match armed {
                None => {
                    // Missing or unparseable: stale, re-arm without running.
                    match next_trigger(now, &stored.config.schedule) {
                        Ok(next) => {
                            warn!(%group, next = %next, "stale schedule re-armed");
                            self.arm(group, next);
                        }
                        Err(e) => {
                            error!(%group, error = %e, "cannot recompute stale trigger");
                        }
                    }
                }
                Some(t) if now >= t => {
                    info!(%group, trigger = %t, "schedule due — running leaderboard job");
                    let window = TallyWindow::trailing(now, self.window_days);
                    match self.runner.run(&stored.config, window).await {
                        Ok(outcome) => {
                            info!(
                                %group,
                                qualified = outcome.ranking.len(),
                                marker_failures = outcome.marker_failures.len(),
                                "job complete"
                            );
                        }
                        Err(e) => {
                            warn!(%group, error = %e, "job failed; next attempt is one period later");
                        }
                    }
                    // Always re-arm, success or failure — a wedged schedule
                    // is worse than a skipped week.
                    match next_trigger(now, &stored.config.schedule) {
                        Ok(next) => self.arm(group, next),
                        Err(e) => error!(%group, error = %e, "cannot recompute next trigger"),
                    }
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Persist a trigger; on write failure keep it in memory as the
    /// authoritative value until a later write succeeds.
    fn arm(&mut self, group: GroupId, next: DateTime<Utc>) {
        match store::set_next_trigger(&self.conn, group, next) {
            Ok(()) => {
                self.overrides.remove(&group);
            }
            Err(e) => {
                error!(%group, error = %e, "failed to persist next trigger; keeping in-memory value");
                self.overrides.insert(group, next);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;

    use podium_core::types::{ChannelRef, MarkerRef, ParticipantId, RankedEntry, ScheduleSpec};

    use super::*;

    struct MockRunner {
        runs: AtomicUsize,
        fail: bool,
    }

    impl MockRunner {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
                fail,
            })
        }

        fn count(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobRunner for MockRunner {
        async fn run(
            &self,
            _cfg: &GroupConfig,
            _window: TallyWindow,
        ) -> std::result::Result<JobOutcome, BoardError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BoardError::ConfigIncomplete("mock failure".into()));
            }
            Ok(JobOutcome {
                ranking: vec![RankedEntry {
                    participant: ParticipantId(1),
                    count: 1,
                }],
                delta: Default::default(),
                marker_failures: vec![],
                report: String::new(),
            })
        }
    }

    fn cfg(group: u64) -> GroupConfig {
        GroupConfig {
            group: GroupId(group),
            report_channel: ChannelRef(2),
            source_channel: ChannelRef(3),
            marker: MarkerRef(4),
            top_n: 3,
            schedule: ScheduleSpec::new(6, 10, 0, chrono_tz::Asia::Kolkata).unwrap(),
        }
    }

    fn engine(runner: Arc<MockRunner>) -> SchedulerEngine {
        let conn = Connection::open_in_memory().unwrap();
        SchedulerEngine::new(conn, runner, &SchedulerConfig::default()).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 4, 12, 0, 0).unwrap()
    }

    fn plant(conn: &Connection, group: u64, trigger: DateTime<Utc>) {
        store::configure(conn, &cfg(group), trigger).unwrap();
    }

    #[tokio::test]
    async fn trigger_exactly_at_now_runs_inclusively() {
        let runner = MockRunner::new(false);
        let mut engine = engine(runner.clone());
        plant(&engine.conn, 1, now());

        engine.tick(now()).await.unwrap();
        assert_eq!(runner.count(), 1);

        // Re-armed strictly into the future.
        let stored = store::get(&engine.conn, GroupId(1)).unwrap().unwrap();
        assert!(stored.next_trigger.unwrap() > now());
    }

    #[tokio::test]
    async fn future_trigger_does_not_run() {
        let runner = MockRunner::new(false);
        let mut engine = engine(runner.clone());
        plant(&engine.conn, 1, now() + Duration::hours(1));

        engine.tick(now()).await.unwrap();
        assert_eq!(runner.count(), 0);
    }

    #[tokio::test]
    async fn weeks_overdue_at_startup_is_stale_not_a_backlog() {
        let runner = MockRunner::new(false);
        let mut engine = engine(runner.clone());
        plant(&engine.conn, 1, now() - Duration::weeks(3));

        engine.recompute_stale_on_startup(now());
        assert_eq!(runner.count(), 0, "stale entries must not run at startup");

        let stored = store::get(&engine.conn, GroupId(1)).unwrap().unwrap();
        let next = stored.next_trigger.unwrap();
        assert!(next > now());
        assert!(next - now() <= Duration::days(7));

        // And the following tick has nothing due.
        engine.tick(now()).await.unwrap();
        assert_eq!(runner.count(), 0);
    }

    #[tokio::test]
    async fn due_exactly_at_startup_stays_armed() {
        let runner = MockRunner::new(false);
        let mut engine = engine(runner.clone());
        plant(&engine.conn, 1, now());

        engine.recompute_stale_on_startup(now());
        let stored = store::get(&engine.conn, GroupId(1)).unwrap().unwrap();
        assert_eq!(stored.next_trigger.unwrap(), now());

        engine.tick(now()).await.unwrap();
        assert_eq!(runner.count(), 1);
    }

    #[tokio::test]
    async fn failed_job_reschedules_without_tight_retry() {
        let runner = MockRunner::new(true);
        let mut engine = engine(runner.clone());
        plant(&engine.conn, 1, now() - Duration::minutes(5));

        engine.tick(now()).await.unwrap();
        assert_eq!(runner.count(), 1);

        // Next tick: trigger is a week out, no immediate retry.
        engine.tick(now() + Duration::minutes(30)).await.unwrap();
        assert_eq!(runner.count(), 1);

        let stored = store::get(&engine.conn, GroupId(1)).unwrap().unwrap();
        assert!(stored.next_trigger.unwrap() > now());
    }

    #[tokio::test]
    async fn missing_trigger_is_rearmed_without_running() {
        let runner = MockRunner::new(false);
        let mut engine = engine(runner.clone());
        plant(&engine.conn, 1, now());
        engine
            .conn
            .execute("UPDATE groups SET next_trigger = NULL", [])
            .unwrap();

        engine.tick(now()).await.unwrap();
        assert_eq!(runner.count(), 0);

        let stored = store::get(&engine.conn, GroupId(1)).unwrap().unwrap();
        assert!(stored.next_trigger.unwrap() > now());
    }

    #[tokio::test]
    async fn one_slow_group_does_not_hide_another_due_group() {
        let runner = MockRunner::new(false);
        let mut engine = engine(runner.clone());
        plant(&engine.conn, 1, now() - Duration::minutes(1));
        plant(&engine.conn, 2, now() - Duration::minutes(1));

        engine.tick(now()).await.unwrap();
        assert_eq!(runner.count(), 2);
    }

    #[tokio::test]
    async fn handle_configure_and_run_now_round_trip() {
        let runner = MockRunner::new(false);
        let handle = SchedulerHandle::new(
            Connection::open_in_memory().unwrap(),
            &SchedulerConfig::default(),
        )
        .unwrap();

        let first = handle.configure(&cfg(9), now()).unwrap();
        assert!(first > now());

        let (next, remaining) = handle.time_until_next(GroupId(9), now()).unwrap();
        assert_eq!(next, first);
        assert!(remaining > Duration::zero());

        let (outcome, rearmed) = handle
            .run_now(GroupId(9), runner.as_ref(), now())
            .await
            .unwrap();
        assert_eq!(runner.count(), 1);
        assert_eq!(outcome.ranking.len(), 1);
        assert!(rearmed > now());
    }

    #[tokio::test]
    async fn handle_repairs_stale_trigger_on_query() {
        let handle = SchedulerHandle::new(
            Connection::open_in_memory().unwrap(),
            &SchedulerConfig::default(),
        )
        .unwrap();

        handle.configure(&cfg(9), now() - Duration::weeks(2)).unwrap();
        // The stored trigger is now in the past relative to `now`.
        let (next, remaining) = handle.time_until_next(GroupId(9), now()).unwrap();
        assert!(next > now());
        assert!(remaining > Duration::zero());
    }

    #[tokio::test]
    async fn run_now_unknown_group_errors() {
        let runner = MockRunner::new(false);
        let handle = SchedulerHandle::new(
            Connection::open_in_memory().unwrap(),
            &SchedulerConfig::default(),
        )
        .unwrap();

        let err = handle
            .run_now(GroupId(404), runner.as_ref(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::GroupNotFound(_)));
    }
}
