use thiserror::Error;

use podium_core::types::GroupId;

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The schedule cannot produce a trigger (out-of-range fields or an
    /// unresolvable wall-clock time).
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// The group config failed validation on configure.
    #[error("Invalid group config: {0}")]
    InvalidConfig(String),

    /// No row for the given group exists in the store.
    #[error("Group not configured: {0}")]
    GroupNotFound(GroupId),

    /// The leaderboard job itself failed. The schedule was still re-armed.
    #[error("Job failed: {0}")]
    Job(#[from] podium_board::BoardError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
