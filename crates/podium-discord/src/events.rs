//! Channel history as an event stream.
//!
//! Pages forward through `GET /channels/{id}/messages` with an `after`
//! snowflake cursor derived from the window start, so only the tally window
//! is ever fetched. Pagination stops at the first message past the window
//! end or on a short page.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use podium_board::traits::{EventStream, SourceError};
use podium_board::{ChannelEvent, EventSource};
use podium_core::types::{ChannelRef, ParticipantId, TallyWindow};

use crate::client::{snowflake_at, DiscordClient};
use crate::error::DiscordError;

const PAGE_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
struct MessageRow {
    id: String,
    author: AuthorRow,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct AuthorRow {
    id: String,
    #[serde(default)]
    bot: bool,
}

fn source_error(channel: ChannelRef, e: DiscordError) -> SourceError {
    if e.is_permission() {
        SourceError::PermissionDenied {
            channel,
            reason: e.to_string(),
        }
    } else {
        SourceError::Transport {
            channel,
            reason: e.to_string(),
        }
    }
}

fn parse_row(row: MessageRow) -> Option<(u64, ChannelEvent)> {
    let id: u64 = row.id.parse().ok()?;
    let author: u64 = row.author.id.parse().ok()?;
    let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&row.timestamp)
        .ok()?
        .with_timezone(&Utc);
    Some((
        id,
        ChannelEvent {
            author: ParticipantId(author),
            timestamp,
            from_bot: row.author.bot,
        },
    ))
}

impl EventSource for DiscordClient {
    fn events(&self, channel: ChannelRef, window: TallyWindow) -> EventStream<'_> {
        Box::pin(async_stream::stream! {
            let mut cursor = snowflake_at(window.start);
            loop {
                let path = format!(
                    "/channels/{channel}/messages?limit={PAGE_LIMIT}&after={cursor}"
                );
                let page: Vec<MessageRow> = match self.get_json(&path).await {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(source_error(channel, e));
                        return;
                    }
                };
                let fetched = page.len();

                // The API returns newest-first; deliver chronologically.
                let mut rows: Vec<(u64, ChannelEvent)> = page
                    .into_iter()
                    .filter_map(|row| {
                        parse_row(row).or_else(|| {
                            warn!(%channel, "skipping malformed message row");
                            None
                        })
                    })
                    .collect();
                rows.sort_by_key(|(id, _)| *id);

                let mut reached_end = false;
                for (id, event) in rows {
                    cursor = cursor.max(id);
                    if event.timestamp > window.end {
                        reached_end = true;
                        break;
                    }
                    yield Ok(event);
                }

                if reached_end || fetched < PAGE_LIMIT {
                    return;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_rows_deserialize_and_parse() {
        let raw = r#"{
            "id": "1112223334445556667",
            "author": {"id": "42", "bot": false},
            "timestamp": "2024-05-01T12:00:00.123000+00:00"
        }"#;
        let row: MessageRow = serde_json::from_str(raw).unwrap();
        let (id, event) = parse_row(row).unwrap();
        assert_eq!(id, 1112223334445556667);
        assert_eq!(event.author, ParticipantId(42));
        assert!(!event.from_bot);
    }

    #[test]
    fn missing_bot_flag_defaults_to_false() {
        let raw = r#"{
            "id": "1",
            "author": {"id": "2"},
            "timestamp": "2024-05-01T12:00:00+00:00"
        }"#;
        let row: MessageRow = serde_json::from_str(raw).unwrap();
        let (_, event) = parse_row(row).unwrap();
        assert!(!event.from_bot);
    }

    #[test]
    fn malformed_rows_are_dropped() {
        let row = MessageRow {
            id: "not-a-number".into(),
            author: AuthorRow {
                id: "2".into(),
                bot: false,
            },
            timestamp: "2024-05-01T12:00:00+00:00".into(),
        };
        assert!(parse_row(row).is_none());
    }
}
