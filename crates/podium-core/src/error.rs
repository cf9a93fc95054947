use thiserror::Error;

#[derive(Debug, Error)]
pub enum PodiumError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid group config: {0}")]
    InvalidGroup(String),
}

pub type Result<T> = std::result::Result<T, PodiumError>;
