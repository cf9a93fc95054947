use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default poll cadence. Coarse on purpose: trigger detection is
/// `now >= next_trigger`, so the loop only needs to wake often enough to
/// keep reports roughly on time.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 1800;

/// Length of the tally window in days.
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Top-level config (podium.toml + PODIUM_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PodiumConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub report: ReportTemplate,
    #[serde(default)]
    pub defaults: ScheduleDefaults,
}

impl PodiumConfig {
    /// Load config. Precedence:
    ///   1. Explicit path argument
    ///   2. PODIUM_CONFIG env var
    ///   3. ~/.podium/podium.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("PODIUM_CONFIG").ok())
            .unwrap_or_else(default_config_path);

        let config: PodiumConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("PODIUM_").split("_"))
            .extract()
            .map_err(|e| crate::error::PodiumError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.podium/podium.toml")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.podium/podium.db")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token. Empty means the Discord adapter cannot be constructed.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: default_api_base(),
        }
    }
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_window_days")]
    pub window_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            window_days: default_window_days(),
        }
    }
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_window_days() -> i64 {
    DEFAULT_WINDOW_DAYS
}

/// Schedule used for a group when setup doesn't override it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleDefaults {
    /// 0 = Monday … 6 = Sunday.
    #[serde(default = "default_weekday")]
    pub weekday: u8,
    #[serde(default = "default_hour")]
    pub hour: u8,
    #[serde(default)]
    pub minute: u8,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for ScheduleDefaults {
    fn default() -> Self {
        Self {
            weekday: default_weekday(),
            hour: default_hour(),
            minute: 0,
            timezone: default_timezone(),
        }
    }
}

fn default_weekday() -> u8 {
    6 // Sunday
}

fn default_hour() -> u8 {
    10
}

fn default_timezone() -> String {
    "Asia/Kolkata".to_string()
}

/// Text skeleton of the published report.
///
/// `{top_n}` is substituted in `header` and `footer`; `{marker}` in
/// `footer`. Everything else is emitted verbatim, so two renders with the
/// same inputs are byte-identical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportTemplate {
    #[serde(default = "default_header")]
    pub header: String,
    /// Per-rank decorations, rank 1 first. Ranks past the end get none.
    #[serde(default = "default_rank_labels")]
    pub rank_labels: Vec<String>,
    /// Per-rank prize lines, rank 1 first. Ranks past the end get none.
    #[serde(default = "default_prizes")]
    pub prizes: Vec<String>,
    #[serde(default = "default_footer")]
    pub footer: String,
    /// Shown in place of a mention when fewer than top_n qualified.
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
}

impl Default for ReportTemplate {
    fn default() -> Self {
        Self {
            header: default_header(),
            rank_labels: default_rank_labels(),
            prizes: default_prizes(),
            footer: default_footer(),
            placeholder: default_placeholder(),
        }
    }
}

fn default_header() -> String {
    "Hello fellas,\nWe're back with the weekly leaderboard update!!\n\
     Here are the top {top_n} active members past week:"
        .to_string()
}

fn default_rank_labels() -> Vec<String> {
    vec![
        ":first_place:".to_string(),
        ":second_place:".to_string(),
        ":third_place:".to_string(),
    ]
}

fn default_prizes() -> Vec<String> {
    vec![
        "50k unb in cash".to_string(),
        "25k unb in cash".to_string(),
        "10k unb in cash".to_string(),
    ]
}

fn default_footer() -> String {
    "All of the top {top_n} members have been granted the role:\n{marker}\n\n\
     Contact the moderators within 24 hours to claim your awards."
        .to_string()
}

fn default_placeholder() -> String {
    "N/A".to_string()
}
