//! Collaborator seams for the leaderboard job.
//!
//! Implementations live outside this crate (`podium-discord` ships the real
//! ones); tests use small in-memory fakes.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use thiserror::Error;

use podium_core::types::{ChannelRef, GroupId, MarkerRef, ParticipantId, TallyWindow};

/// One timestamped authored event from the source channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelEvent {
    pub author: ParticipantId,
    pub timestamp: DateTime<Utc>,
    /// Bot-authored events never count.
    pub from_bot: bool,
}

/// Fatal read error from the event source. Any of these aborts the whole
/// tally — partial counts are never returned.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("permission denied reading channel {channel}: {reason}")]
    PermissionDenied { channel: ChannelRef, reason: String },

    #[error("transport failure reading channel {channel}: {reason}")]
    Transport { channel: ChannelRef, reason: String },
}

/// Membership mutation failure. Grant/revoke errors are per-participant and
/// non-fatal to the run; holder/privilege lookups failing aborts the run.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("denied for participant {participant}: {reason}")]
    Denied {
        participant: ParticipantId,
        reason: String,
    },

    #[error("membership transport failure: {reason}")]
    Transport { reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("failed to post to channel {channel}: {reason}")]
    Send { channel: ChannelRef, reason: String },
}

pub type EventStream<'a> = BoxStream<'a, std::result::Result<ChannelEvent, SourceError>>;

/// Query for events within a bounded time window. The stream is consumed
/// exactly once per run; re-querying yields a fresh stream.
pub trait EventSource: Send + Sync {
    fn events(&self, channel: ChannelRef, window: TallyWindow) -> EventStream<'_>;
}

/// External mutable award state — read once per run, written as a delta.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn current_holders(
        &self,
        group: GroupId,
        marker: MarkerRef,
    ) -> std::result::Result<BTreeSet<ParticipantId>, StoreError>;

    async fn grant(
        &self,
        group: GroupId,
        participant: ParticipantId,
        marker: MarkerRef,
    ) -> std::result::Result<(), StoreError>;

    async fn revoke(
        &self,
        group: GroupId,
        participant: ParticipantId,
        marker: MarkerRef,
    ) -> std::result::Result<(), StoreError>;

    /// Whether the acting agent outranks the marker. Checked once per run
    /// before any mutation is attempted.
    async fn can_manage(
        &self,
        group: GroupId,
        marker: MarkerRef,
    ) -> std::result::Result<bool, StoreError>;
}

/// Outbound report channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel: ChannelRef, text: &str)
        -> std::result::Result<(), NotifyError>;
}
