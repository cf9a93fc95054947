use thiserror::Error;

use podium_core::types::{GroupId, MarkerRef};

use crate::traits::{NotifyError, SourceError, StoreError};

#[derive(Debug, Error)]
pub enum BoardError {
    /// The group's configuration no longer resolves (missing channel, role,
    /// out-of-range top_n). The run is skipped.
    #[error("group configuration incomplete: {0}")]
    ConfigIncomplete(String),

    /// The event source failed mid-stream. The whole tally is discarded and
    /// rotation/report never happen for this run.
    #[error("event source read failed: {0}")]
    SourceRead(#[from] SourceError),

    /// The acting agent does not outrank the marker. No adds or removes were
    /// attempted and no report was posted.
    #[error("insufficient privilege to manage marker {marker} in group {group}")]
    PrivilegeInsufficient { group: GroupId, marker: MarkerRef },

    /// Holder or privilege lookup failed — distinct from per-participant
    /// grant/revoke failures, which are collected in the job outcome.
    #[error("membership store failure: {0}")]
    Store(StoreError),

    #[error("report delivery failed: {0}")]
    Notify(#[from] NotifyError),
}

pub type Result<T> = std::result::Result<T, BoardError>;
