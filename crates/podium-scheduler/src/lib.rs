//! `podium-scheduler` — weekly trigger scheduling with SQLite persistence.
//!
//! # Overview
//!
//! Each group has one row in the SQLite `groups` table: its full config
//! plus the absolute UTC instant of the next run (see [`store::StoredGroup`]).
//! The [`engine::SchedulerEngine`] polls at a coarse, fixed interval and
//! runs the leaderboard job for any group whose trigger has arrived,
//! always recomputing the following week's trigger afterwards.
//!
//! # Scheduling rules
//!
//! | Situation                         | Behaviour                               |
//! |-----------------------------------|-----------------------------------------|
//! | `now >= next_trigger` on a tick   | Run once, re-arm for the following week |
//! | Trigger already past at startup   | Stale: re-arm without running           |
//! | Trigger missing or unparseable    | Stale: re-arm without running           |
//! | Several periods missed while down | Collapse to the single startup re-arm   |
//! | Job fails                         | Re-arm anyway; retry is next period     |

pub mod engine;
pub mod error;
pub mod schedule;
pub mod store;

pub use engine::{JobRunner, SchedulerEngine, SchedulerHandle};
pub use error::{Result, SchedulerError};
pub use store::StoredGroup;
