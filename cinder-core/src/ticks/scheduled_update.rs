//! Scheduled update type.

use std::cmp::Ordering;

use cinder_registry::BlockState;
use cinder_utils::BlockPos;

/// A pending update for one block.
///
/// The update carries the state the block had when it was scheduled. When it comes due
/// and the block has changed since, the update is discarded.
#[derive(Debug, Clone)]
pub struct ScheduledUpdate {
    /// The position to update.
    pub pos: BlockPos,
    /// The absolute tick at which the update runs.
    pub due_tick: u64,
    /// The block state at scheduling time.
    pub state: BlockState,
    /// Insertion order, used to break ties between updates due on the same tick.
    pub sequence: u64,
}

impl ScheduledUpdate {
    /// Creates a scheduled update.
    #[must_use]
    pub fn new(pos: BlockPos, due_tick: u64, state: BlockState, sequence: u64) -> Self {
        Self {
            pos,
            due_tick,
            state,
            sequence,
        }
    }

    /// Ticks left until the update is due, saturating at zero.
    #[must_use]
    pub fn remaining(&self, current_tick: u64) -> u64 {
        self.due_tick.saturating_sub(current_tick)
    }
}

impl PartialEq for ScheduledUpdate {
    fn eq(&self, other: &Self) -> bool {
        self.due_tick == other.due_tick && self.sequence == other.sequence
    }
}

impl Eq for ScheduledUpdate {}

impl PartialOrd for ScheduledUpdate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledUpdate {
    /// Ordering for the priority queue.
    ///
    /// Note: `BinaryHeap` is a max-heap, so the comparison is reversed to get the earliest
    /// update first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due_tick
            .cmp(&self.due_tick)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earlier_due_ticks_sort_first() {
        let pos = BlockPos::new(0, 0, 0);
        let early = ScheduledUpdate::new(pos, 100, BlockState::air(), 5);
        let late = ScheduledUpdate::new(pos, 200, BlockState::air(), 0);
        // In a max-heap, "greater" means popped first.
        assert!(early > late);
    }

    #[test]
    fn sequence_breaks_ties() {
        let pos = BlockPos::new(0, 0, 0);
        let first = ScheduledUpdate::new(pos, 100, BlockState::air(), 1);
        let second = ScheduledUpdate::new(pos, 100, BlockState::air(), 2);
        assert!(first > second);
    }
}
