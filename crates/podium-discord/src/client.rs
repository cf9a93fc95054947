//! Minimal authenticated REST client plus snowflake helpers.

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;

use podium_core::config::DiscordConfig;

use crate::error::{DiscordError, Result};

/// Discord's epoch: 2015-01-01T00:00:00Z, in Unix milliseconds. Snowflake
/// ids carry their creation time relative to this, shifted left 22 bits.
const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

/// The smallest snowflake created at or after `at` — usable as an `after`
/// cursor to start paginating history from a point in time.
pub fn snowflake_at(at: DateTime<Utc>) -> u64 {
    let ms = (at.timestamp_millis() - DISCORD_EPOCH_MS).max(0) as u64;
    ms << 22
}

/// The creation instant embedded in a snowflake.
pub fn snowflake_timestamp(id: u64) -> DateTime<Utc> {
    let ms = (id >> 22) as i64 + DISCORD_EPOCH_MS;
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl DiscordClient {
    pub fn new(cfg: &DiscordConfig) -> Result<Self> {
        if cfg.token.is_empty() {
            return Err(DiscordError::Config(
                "discord token must not be empty".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("podium/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            token: cfg.token.clone(),
        })
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .http
            .get(format!("{}{path}", self.api_base))
            .header(AUTHORIZATION, self.auth())
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub(crate) async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}{path}", self.api_base))
            .header(AUTHORIZATION, self.auth())
            .json(body)
            .send()
            .await?;
        Self::check(resp).await.map(|_| ())
    }

    pub(crate) async fn put_empty(&self, path: &str) -> Result<()> {
        let resp = self
            .http
            .put(format!("{}{path}", self.api_base))
            .header(AUTHORIZATION, self.auth())
            .send()
            .await?;
        Self::check(resp).await.map(|_| ())
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<()> {
        let resp = self
            .http
            .delete(format!("{}{path}", self.api_base))
            .header(AUTHORIZATION, self.auth())
            .send()
            .await?;
        Self::check(resp).await.map(|_| ())
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(DiscordError::Api {
            status: status.as_u16(),
            body,
        })
    }
}
