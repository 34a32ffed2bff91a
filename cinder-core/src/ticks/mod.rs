//! Scheduled block updates.
//!
//! Content asks for a block to be revisited a number of ticks from now. Each position has
//! at most one pending update; scheduling again replaces the earlier request. Updates run
//! in due-tick order and, within a tick, in the order they were scheduled.
//!
//! - [`ScheduledUpdate`] - A single pending update
//! - [`ScheduledUpdateQueue`] - The world's queue with per-position replacement

mod scheduled_update;
mod update_queue;

pub use scheduled_update::ScheduledUpdate;
pub use update_queue::ScheduledUpdateQueue;
