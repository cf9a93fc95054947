//! `podium-board` — the leaderboard pipeline: tally, rotate, report.
//!
//! Pure logic lives in [`tally`], [`rotate`] and [`report`]; [`job`] strings
//! them together against the external collaborators defined in [`traits`]
//! (event source, membership store, notifier). The collaborators are the
//! only I/O seam — everything else is deterministic and unit-testable.

pub mod error;
pub mod job;
pub mod report;
pub mod rotate;
pub mod tally;
pub mod traits;

pub use error::{BoardError, Result};
pub use job::{run_group_job, JobOutcome, MarkerAction, MarkerFailure};
pub use traits::{ChannelEvent, EventSource, MembershipStore, Notifier};
