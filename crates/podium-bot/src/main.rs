use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use podium_core::config::PodiumConfig;
use podium_core::types::{ChannelRef, GroupConfig, GroupId, MarkerRef, ScheduleSpec};
use podium_discord::DiscordClient;
use podium_scheduler::{SchedulerEngine, SchedulerHandle};

mod runner;

use runner::BoardRunner;

#[derive(Parser)]
#[command(name = "podium-bot", about = "Weekly activity leaderboard daemon")]
struct Cli {
    /// Config file path. Falls back to PODIUM_CONFIG, then ~/.podium/podium.toml.
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler daemon (the default when no subcommand is given).
    Run,
    /// Configure (or fully replace) a group's leaderboard.
    Setup {
        #[arg(long)]
        group: u64,
        /// Channel the report is posted to.
        #[arg(long)]
        report_channel: u64,
        /// Channel whose messages are counted.
        #[arg(long)]
        source_channel: u64,
        /// Role granted to the winners.
        #[arg(long)]
        marker: u64,
        /// How many members to rank (1-50).
        #[arg(long, default_value_t = 3)]
        top: u32,
        /// 0 = Monday … 6 = Sunday. Defaults come from the config file.
        #[arg(long)]
        weekday: Option<u8>,
        #[arg(long)]
        hour: Option<u8>,
        #[arg(long)]
        minute: Option<u8>,
        /// IANA zone name, e.g. "Asia/Kolkata".
        #[arg(long)]
        timezone: Option<String>,
    },
    /// Tear a group down.
    Remove {
        #[arg(long)]
        group: u64,
    },
    /// List configured groups and their next triggers.
    Groups,
    /// Run a group's leaderboard immediately and re-arm its schedule.
    RunNow {
        #[arg(long)]
        group: u64,
    },
    /// Show the time remaining until a group's next scheduled run.
    Timer {
        #[arg(long)]
        group: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "podium_bot=info,podium_scheduler=info,podium_board=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let config = PodiumConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({e}), using defaults");
        PodiumConfig::default()
    });

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_daemon(config).await,
        Command::Setup {
            group,
            report_channel,
            source_channel,
            marker,
            top,
            weekday,
            hour,
            minute,
            timezone,
        } => {
            let defaults = &config.defaults;
            let zone_name = timezone.unwrap_or_else(|| defaults.timezone.clone());
            let zone = Tz::from_str(&zone_name)
                .map_err(|e| anyhow::anyhow!("unknown timezone {zone_name}: {e}"))?;
            let schedule = ScheduleSpec::new(
                weekday.unwrap_or(defaults.weekday),
                hour.unwrap_or(defaults.hour),
                minute.unwrap_or(defaults.minute),
                zone,
            )?;

            let group_cfg = GroupConfig {
                group: GroupId(group),
                report_channel: ChannelRef(report_channel),
                source_channel: ChannelRef(source_channel),
                marker: MarkerRef(marker),
                top_n: top,
                schedule: schedule.clone(),
            };

            let handle = open_handle(&config)?;
            let first = handle.configure(&group_cfg, Utc::now())?;
            println!("Group {group} configured: every {schedule}, top {top}.");
            println!("First scheduled run: {}", first.to_rfc3339());
            Ok(())
        }
        Command::Remove { group } => {
            let handle = open_handle(&config)?;
            handle.remove_group(GroupId(group))?;
            println!("Group {group} removed.");
            Ok(())
        }
        Command::Groups => {
            let handle = open_handle(&config)?;
            let groups = handle.list_groups()?;
            if groups.is_empty() {
                println!("No groups configured.");
            }
            for stored in groups {
                let next = stored
                    .next_trigger
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "stale (re-armed on next poll)".to_string());
                println!(
                    "group {}  top {}  every {}  next: {next}",
                    stored.config.group, stored.config.top_n, stored.config.schedule
                );
            }
            Ok(())
        }
        Command::RunNow { group } => {
            let handle = open_handle(&config)?;
            let runner = build_runner(&config)?;
            let (outcome, next) = handle
                .run_now(GroupId(group), runner.as_ref(), Utc::now())
                .await?;
            println!(
                "Leaderboard posted for group {group}: {} qualified, {} marker failure(s).",
                outcome.ranking.len(),
                outcome.marker_failures.len()
            );
            println!("Next scheduled run: {}", next.to_rfc3339());
            Ok(())
        }
        Command::Timer { group } => {
            let handle = open_handle(&config)?;
            let (next, remaining) = handle.time_until_next(GroupId(group), Utc::now())?;
            let hours = remaining.num_hours();
            let minutes = remaining.num_minutes() % 60;
            println!("Next run at {} (in {hours}h {minutes}m).", next.to_rfc3339());
            Ok(())
        }
    }
}

async fn run_daemon(config: PodiumConfig) -> anyhow::Result<()> {
    let runner = build_runner(&config)?;
    let conn = open_db(&config)?;
    let engine = SchedulerEngine::new(conn, runner, &config.scheduler)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received; finishing the current tick");
            let _ = shutdown_tx.send(true);
        }
    });

    engine.run(shutdown_rx).await;
    Ok(())
}

fn build_runner(config: &PodiumConfig) -> anyhow::Result<Arc<BoardRunner>> {
    let client = DiscordClient::new(&config.discord)?;
    Ok(Arc::new(BoardRunner::new(client, config.report.clone())))
}

fn open_handle(config: &PodiumConfig) -> anyhow::Result<SchedulerHandle> {
    let conn = open_db(config)?;
    Ok(SchedulerHandle::new(conn, &config.scheduler)?)
}

fn open_db(config: &PodiumConfig) -> anyhow::Result<rusqlite::Connection> {
    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");
    let conn = rusqlite::Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}
