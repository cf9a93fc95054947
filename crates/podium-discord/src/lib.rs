//! `podium-discord` — Discord REST adapter for the leaderboard collaborators.
//!
//! Implements [`podium_board::EventSource`] (channel history),
//! [`podium_board::MembershipStore`] (role grants) and
//! [`podium_board::Notifier`] (report posting) over plain REST calls.
//! There is no gateway connection: a scheduled reporting job only ever
//! pulls history and pushes a handful of writes, so a websocket session
//! would be dead weight.

pub mod client;
pub mod error;
pub mod events;
pub mod roles;
pub mod send;

pub use client::DiscordClient;
pub use error::DiscordError;
