//! Report posting, chunked to Discord's message limit.

use async_trait::async_trait;

use podium_board::traits::NotifyError;
use podium_board::Notifier;
use podium_core::types::ChannelRef;

use crate::client::DiscordClient;

/// Discord caps messages at 2000 characters; 1950 leaves headroom.
const CHUNK_MAX: usize = 1950;

/// Split `text` into chunks of at most [`CHUNK_MAX`] characters, preferring
/// newline then space boundaries so a rank line is never cut mid-way.
pub fn split_chunks(text: &str) -> Vec<String> {
    if text.len() <= CHUNK_MAX {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while remaining.len() > CHUNK_MAX {
        let window = &remaining[..CHUNK_MAX];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .unwrap_or(CHUNK_MAX);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    if !remaining.is_empty() {
        chunks.push(remaining.to_string());
    }

    chunks
}

#[async_trait]
impl Notifier for DiscordClient {
    async fn send(
        &self,
        channel: ChannelRef,
        text: &str,
    ) -> std::result::Result<(), NotifyError> {
        for chunk in split_chunks(text) {
            self.post_json(
                &format!("/channels/{channel}/messages"),
                &serde_json::json!({ "content": chunk }),
            )
            .await
            .map_err(|e| NotifyError::Send {
                channel,
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}
