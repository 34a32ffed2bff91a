//! World-level scheduled update queue.

use std::{collections::BinaryHeap, mem};

use cinder_registry::BlockState;
use cinder_utils::{BlockPos, ChunkPos};
use rustc_hash::FxHashMap;

use super::ScheduledUpdate;

/// Pending updates of a world.
///
/// Replacing an update leaves the old heap entry in place; it is recognised as stale by its
/// sequence number and skipped when popped. Stale entries are purged in bulk once they
/// outnumber live ones.
#[derive(Debug, Default)]
pub struct ScheduledUpdateQueue {
    queue: BinaryHeap<ScheduledUpdate>,
    /// The live sequence number per position.
    live: FxHashMap<BlockPos, u64>,
    next_sequence: u64,
    stale: usize,
}

impl ScheduledUpdateQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules an update of `pos` to run `delay` ticks after `current_tick`, replacing any
    /// pending update of the same position.
    ///
    /// Returns the tick the update is due on.
    pub fn schedule(&mut self, pos: BlockPos, state: BlockState, current_tick: u64, delay: u64) -> u64 {
        let due_tick = current_tick.saturating_add(delay);
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        if self.live.insert(pos, sequence).is_some() {
            self.stale += 1;
        }
        self.queue
            .push(ScheduledUpdate::new(pos, due_tick, state, sequence));
        self.purge_if_needed();
        due_tick
    }

    /// Pops up to `max` updates due at or before `current_tick`, earliest first.
    ///
    /// Updates beyond `max` stay queued for the next call.
    pub fn due_entries(&mut self, current_tick: u64, max: usize) -> Vec<ScheduledUpdate> {
        let mut due = Vec::new();
        while due.len() < max {
            match self.queue.peek() {
                Some(next) if next.due_tick <= current_tick => {}
                _ => break,
            }
            let Some(update) = self.queue.pop() else {
                break;
            };
            if self.is_live(&update) {
                self.live.remove(&update.pos);
                due.push(update);
            } else {
                self.stale = self.stale.saturating_sub(1);
            }
        }
        due
    }

    /// Removes and returns the live updates of every position inside `chunk`.
    pub fn remove_chunk(&mut self, chunk: ChunkPos) -> Vec<ScheduledUpdate> {
        let mut removed = Vec::new();
        self.retain(|update| {
            if update.pos.chunk_pos() == chunk {
                removed.push(update.clone());
                false
            } else {
                true
            }
        });
        removed.sort_by(|a, b| b.cmp(a));
        removed
    }

    /// Returns copies of the live updates of every position inside `chunk`.
    #[must_use]
    pub fn entries_in_chunk(&self, chunk: ChunkPos) -> Vec<ScheduledUpdate> {
        let mut entries: Vec<ScheduledUpdate> = self
            .queue
            .iter()
            .filter(|update| update.pos.chunk_pos() == chunk && self.is_live(update))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries
    }

    /// Returns the tick the pending update of `pos` is due on, if any.
    #[must_use]
    pub fn due_tick_of(&self, pos: BlockPos) -> Option<u64> {
        let sequence = self.live.get(&pos)?;
        self.queue
            .iter()
            .find(|update| update.sequence == *sequence)
            .map(|update| update.due_tick)
    }

    /// Returns true if `pos` has a pending update.
    #[must_use]
    pub fn is_scheduled(&self, pos: BlockPos) -> bool {
        self.live.contains_key(&pos)
    }

    /// The number of pending updates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    fn is_live(&self, update: &ScheduledUpdate) -> bool {
        self.live.get(&update.pos) == Some(&update.sequence)
    }

    fn purge_if_needed(&mut self) {
        if self.stale > 64 && self.stale > self.live.len() {
            self.retain(|_| true);
        }
    }

    /// Rebuilds the heap from live entries matching `keep`, dropping all stale ones.
    fn retain(&mut self, mut keep: impl FnMut(&ScheduledUpdate) -> bool) {
        let old = mem::take(&mut self.queue);
        for update in old {
            if !self.is_live(&update) {
                continue;
            }
            if keep(&update) {
                self.queue.push(update);
            } else {
                self.live.remove(&update.pos);
            }
        }
        self.stale = 0;
    }
}
