use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("Discord configuration error: {0}")]
    Config(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Discord API error (status {status}): {body}")]
    Api { status: u16, body: String },
}

impl DiscordError {
    /// True for responses Discord sends when the bot lacks a permission.
    pub fn is_permission(&self) -> bool {
        matches!(self, DiscordError::Api { status: 403, .. })
    }
}

pub type Result<T> = std::result::Result<T, DiscordError>;
