//! Tracks which viewers have which containers open.
//!
//! Each registered container owns one entry holding its viewers and the block positions it
//! occupies. Open and close actions are edge-triggered: the transition from zero to one
//! viewer broadcasts [`BlockAction::Open`] and the transition back to zero broadcasts
//! [`BlockAction::Close`]. Membership changes and the matching broadcast happen under the
//! entry's write lock, so concurrent opens of the same container produce exactly one
//! `Open`.
//!
//! Entry locks are leaves of the world's lock order: they may be taken while chunk locks are
//! held, never the other way around. When two entries are locked together the lower
//! [`ContainerId`] is locked first.

use std::sync::Arc;

use cinder_registry::ItemStack;
use cinder_utils::{BlockPos, ViewerId, locks::SyncRwLock};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::{BlockAction, ViewerHandle};
use crate::inventory::ContainerId;

/// Error returned when adding a viewer to a container that no longer exists.
#[derive(Debug, thiserror::Error)]
pub enum AddViewerError {
    /// The container was unregistered or replaced.
    #[error("container {0} is not registered")]
    Unregistered(ContainerId),
}

#[derive(Debug, Default)]
struct ViewerEntry {
    viewers: FxHashMap<ViewerId, ViewerHandle>,
    positions: SmallVec<[BlockPos; 2]>,
    removed: bool,
}

impl ViewerEntry {
    /// Drops handles of dead sessions. Returns true if that emptied the entry.
    fn prune(&mut self) -> bool {
        let before = self.viewers.len();
        self.viewers.retain(|_, handle| !handle.is_dead());
        before > 0 && self.viewers.is_empty()
    }
}

type SharedEntry = Arc<SyncRwLock<ViewerEntry>>;

/// Registry of container viewers.
#[derive(Default)]
pub struct ViewerRegistry {
    entries: scc::HashMap<ContainerId, SharedEntry>,
}

impl ViewerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: ContainerId) -> Option<SharedEntry> {
        self.entries.read_sync(&id, |_, entry| entry.clone())
    }

    /// Registers a container at the given positions, or updates its positions.
    pub fn register(&self, id: ContainerId, positions: &[BlockPos]) {
        loop {
            if let Some(entry) = self.entry(id) {
                entry.write().positions = positions.iter().copied().collect();
                return;
            }
            let entry = Arc::new(SyncRwLock::new(ViewerEntry {
                positions: positions.iter().copied().collect(),
                ..ViewerEntry::default()
            }));
            if self.entries.insert_sync(id, entry).is_ok() {
                return;
            }
        }
    }

    /// Returns true if the container is registered.
    #[must_use]
    pub fn is_registered(&self, id: ContainerId) -> bool {
        self.entries.read_sync(&id, |_, _| ()).is_some()
    }

    /// The positions a container occupies.
    #[must_use]
    pub fn positions(&self, id: ContainerId) -> Vec<BlockPos> {
        self.entry(id)
            .map(|entry| entry.read().positions.to_vec())
            .unwrap_or_default()
    }

    /// Adds a viewer to a container.
    ///
    /// If this is the first viewer, `broadcast` is called with the container's positions and
    /// [`BlockAction::Open`] before the lock is released. Returns `Ok(true)` in that case and
    /// `Ok(false)` if the container was already open. Adding a viewer twice is a no-op.
    pub fn add_viewer(
        &self,
        id: ContainerId,
        viewer: ViewerHandle,
        broadcast: impl FnOnce(&[BlockPos], BlockAction),
    ) -> Result<bool, AddViewerError> {
        let entry = self.entry(id).ok_or(AddViewerError::Unregistered(id))?;
        let mut entry = entry.write();
        if entry.removed {
            return Err(AddViewerError::Unregistered(id));
        }

        if entry.prune() {
            log::debug!("Container {id} lost all of its viewers to dropped sessions");
        }
        let was_empty = entry.viewers.is_empty();
        if entry.viewers.insert(viewer.id(), viewer).is_some() || !was_empty {
            return Ok(false);
        }

        broadcast(&entry.positions, BlockAction::Open);
        Ok(true)
    }

    /// Removes a viewer from a container.
    ///
    /// If the container is left without viewers, `broadcast` is called with
    /// [`BlockAction::Close`] and `true` is returned. Removing an absent viewer is a no-op.
    pub fn remove_viewer(
        &self,
        id: ContainerId,
        viewer: ViewerId,
        broadcast: impl FnOnce(&[BlockPos], BlockAction),
    ) -> bool {
        let Some(entry) = self.entry(id) else {
            return false;
        };
        let mut entry = entry.write();
        if entry.viewers.remove(&viewer).is_none() {
            return false;
        }
        entry.prune();
        if !entry.viewers.is_empty() {
            return false;
        }

        broadcast(&entry.positions, BlockAction::Close);
        true
    }

    /// Removes a viewer from every container it has open, closing those left empty.
    ///
    /// Returns the number of containers the viewer was removed from.
    pub fn remove_viewer_everywhere(
        &self,
        viewer: ViewerId,
        mut broadcast: impl FnMut(&[BlockPos], BlockAction),
    ) -> usize {
        let mut candidates = Vec::new();
        self.entries.iter_sync(|_, entry| {
            candidates.push(entry.clone());
            true
        });

        let mut removed = 0;
        for entry in candidates {
            let mut entry = entry.write();
            if entry.removed || entry.viewers.remove(&viewer).is_none() {
                continue;
            }
            removed += 1;
            entry.prune();
            if entry.viewers.is_empty() {
                broadcast(&entry.positions, BlockAction::Close);
            }
        }
        removed
    }

    /// Sends a slot change to every live viewer of a container.
    pub fn notify_slot_change(&self, id: ContainerId, slot: usize, stack: &ItemStack) {
        let Some(entry) = self.entry(id) else {
            return;
        };
        let entry = entry.read();
        for viewer in entry.viewers.values().filter_map(ViewerHandle::upgrade) {
            viewer.view_slot_change(slot, stack);
        }
    }

    /// Shows `action` at every position of a container to the container's own viewers.
    pub fn notify_action(&self, id: ContainerId, action: BlockAction) {
        let Some(entry) = self.entry(id) else {
            return;
        };
        let entry = entry.read();
        for viewer in entry.viewers.values().filter_map(ViewerHandle::upgrade) {
            for pos in &entry.positions {
                viewer.view_block_action(*pos, action);
            }
        }
    }

    /// The live viewers of a container.
    #[must_use]
    pub fn viewers(&self, id: ContainerId) -> Vec<ViewerHandle> {
        self.entry(id)
            .map(|entry| {
                entry
                    .read()
                    .viewers
                    .values()
                    .filter(|handle| !handle.is_dead())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The number of live viewers of a container.
    #[must_use]
    pub fn viewer_count(&self, id: ContainerId) -> usize {
        self.viewers(id).len()
    }

    /// Moves every viewer of the `from` containers onto `to` and retires them.
    ///
    /// Each retired container that had viewers is closed, then `to` opens once if it was not
    /// already open, so both halves of a paired container show the same state. All entries
    /// are locked together. `to` must already be registered.
    pub fn rehome(
        &self,
        from: &[ContainerId],
        to: ContainerId,
        mut broadcast: impl FnMut(&[BlockPos], BlockAction),
    ) {
        let mut old: SmallVec<[(ContainerId, SharedEntry); 2]> = from
            .iter()
            .filter(|id| **id != to)
            .filter_map(|id| self.entries.remove_sync(id))
            .collect();
        if old.is_empty() {
            return;
        }
        old.sort_unstable_by_key(|(id, _)| *id);
        let Some(new) = self.entry(to) else {
            for (_, entry) in &old {
                entry.write().removed = true;
            }
            log::warn!("Cannot move viewers to unregistered container {to}");
            return;
        };

        let split = old.partition_point(|(id, _)| *id < to);
        let mut old_entries: SmallVec<[_; 2]> =
            old[..split].iter().map(|(_, entry)| entry.write()).collect();
        let mut new_entry = new.write();
        old_entries.extend(old[split..].iter().map(|(_, entry)| entry.write()));

        new_entry.prune();
        let was_empty = new_entry.viewers.is_empty();
        let mut moved = Vec::new();
        for entry in &mut old_entries {
            entry.removed = true;
            entry.prune();
            if entry.viewers.is_empty() {
                continue;
            }
            let closing: SmallVec<[BlockPos; 2]> = entry
                .positions
                .iter()
                .filter(|&&pos| was_empty || !new_entry.positions.contains(&pos))
                .copied()
                .collect();
            if !closing.is_empty() {
                broadcast(&closing, BlockAction::Close);
            }
            moved.extend(entry.viewers.drain());
        }
        if moved.is_empty() {
            return;
        }

        new_entry.viewers.extend(moved);
        if was_empty {
            broadcast(&new_entry.positions, BlockAction::Open);
        }
        log::debug!("Moved viewers of {} containers to {to}", old.len());
    }

    /// Removes a container, closing it if it had viewers.
    ///
    /// Returns the viewers it had.
    pub fn unregister(
        &self,
        id: ContainerId,
        broadcast: impl FnOnce(&[BlockPos], BlockAction),
    ) -> Vec<ViewerHandle> {
        let Some((_, entry)) = self.entries.remove_sync(&id) else {
            return Vec::new();
        };
        let mut entry = entry.write();
        entry.removed = true;
        entry.prune();
        if entry.viewers.is_empty() {
            return Vec::new();
        }
        broadcast(&entry.positions, BlockAction::Close);
        entry.viewers.drain().map(|(_, handle)| handle).collect()
    }

    /// Removes a container without notifying anyone.
    pub fn forget(&self, id: ContainerId) {
        if let Some((_, entry)) = self.entries.remove_sync(&id) {
            entry.write().removed = true;
        }
    }

    /// The number of registered containers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no containers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Barrier, thread};

    use cinder_utils::locks::SyncMutex;

    use super::*;
    use crate::viewer::{Viewer, test_viewer::RecordingViewer};

    type Broadcasts = SyncMutex<Vec<(Vec<BlockPos>, BlockAction)>>;

    fn recorder(log: &Broadcasts) -> impl FnMut(&[BlockPos], BlockAction) + '_ {
        move |positions, action| log.lock().push((positions.to_vec(), action))
    }

    fn registered(registry: &ViewerRegistry) -> ContainerId {
        let id = ContainerId::next();
        registry.register(id, &[BlockPos::new(0, 64, 0)]);
        id
    }

    #[test]
    fn open_and_close_are_edge_triggered() {
        let registry = ViewerRegistry::new();
        let id = registered(&registry);
        let log = Broadcasts::default();
        let first = RecordingViewer::new().as_viewer();
        let second = RecordingViewer::new().as_viewer();

        assert!(registry.add_viewer(id, ViewerHandle::new(&first), recorder(&log)).unwrap());
        assert!(!registry.add_viewer(id, ViewerHandle::new(&second), recorder(&log)).unwrap());
        assert!(!registry.add_viewer(id, ViewerHandle::new(&second), recorder(&log)).unwrap());
        assert!(!registry.remove_viewer(id, first.viewer_id(), recorder(&log)));
        assert!(registry.remove_viewer(id, second.viewer_id(), recorder(&log)));
        assert!(!registry.remove_viewer(id, second.viewer_id(), recorder(&log)));

        let actions: Vec<_> = log.lock().iter().map(|(_, action)| *action).collect();
        assert_eq!(actions, vec![BlockAction::Open, BlockAction::Close]);
    }

    #[test]
    fn concurrent_opens_broadcast_once() {
        const THREADS: usize = 16;
        let registry = ViewerRegistry::new();
        let id = registered(&registry);
        let log = Broadcasts::default();
        let viewers: Vec<_> = (0..THREADS).map(|_| RecordingViewer::new().as_viewer()).collect();
        let barrier = Barrier::new(THREADS);

        thread::scope(|scope| {
            for viewer in &viewers {
                let (registry, log, barrier) = (&registry, &log, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    registry
                        .add_viewer(id, ViewerHandle::new(viewer), recorder(log))
                        .unwrap();
                });
            }
        });

        assert_eq!(log.lock().len(), 1);
        assert_eq!(registry.viewer_count(id), THREADS);
    }

    #[test]
    fn slot_changes_reach_live_viewers_only() {
        let registry = ViewerRegistry::new();
        let id = registered(&registry);
        let kept = RecordingViewer::new();
        let dropped = RecordingViewer::new();
        let log = Broadcasts::default();

        registry
            .add_viewer(id, ViewerHandle::new(&kept.as_viewer()), recorder(&log))
            .unwrap();
        registry
            .add_viewer(id, ViewerHandle::new(&dropped.as_viewer()), recorder(&log))
            .unwrap();
        drop(dropped);

        let stack = ItemStack::new(cinder_utils::Identifier::vanilla_static("stone"), 1);
        registry.notify_slot_change(id, 4, &stack);
        assert_eq!(kept.slot_changes(), vec![(4, stack)]);
        assert_eq!(registry.viewer_count(id), 1);
    }

    #[test]
    fn session_teardown_closes_everything_it_had_open() {
        let registry = ViewerRegistry::new();
        let (a, b) = (registered(&registry), registered(&registry));
        let viewer = RecordingViewer::new().as_viewer();
        let other = RecordingViewer::new().as_viewer();
        let log = Broadcasts::default();

        registry.add_viewer(a, ViewerHandle::new(&viewer), recorder(&log)).unwrap();
        registry.add_viewer(b, ViewerHandle::new(&viewer), recorder(&log)).unwrap();
        registry.add_viewer(b, ViewerHandle::new(&other), recorder(&log)).unwrap();
        log.lock().clear();

        assert_eq!(registry.remove_viewer_everywhere(viewer.viewer_id(), recorder(&log)), 2);
        assert_eq!(log.lock().len(), 1);
        assert_eq!(registry.viewer_count(a), 0);
        assert_eq!(registry.viewer_count(b), 1);
    }

    #[test]
    fn rehome_moves_viewers_and_retires_the_old_entry() {
        let registry = ViewerRegistry::new();
        let old = registered(&registry);
        let new = ContainerId::next();
        registry.register(new, &[BlockPos::new(0, 64, 0), BlockPos::new(1, 64, 0)]);
        let viewer = RecordingViewer::new().as_viewer();
        let log = Broadcasts::default();

        registry.add_viewer(old, ViewerHandle::new(&viewer), recorder(&log)).unwrap();
        log.lock().clear();
        registry.rehome(&[old], new, recorder(&log));

        let actions: Vec<_> = log.lock().iter().map(|(p, a)| (p.len(), *a)).collect();
        assert_eq!(actions, vec![(1, BlockAction::Close), (2, BlockAction::Open)]);
        assert!(!registry.is_registered(old));
        assert_eq!(registry.viewer_count(new), 1);
        assert!(matches!(
            registry.add_viewer(old, ViewerHandle::new(&viewer), recorder(&log)),
            Err(AddViewerError::Unregistered(_))
        ));
    }

    #[test]
    fn rehoming_two_open_containers_opens_the_target_once() {
        let registry = ViewerRegistry::new();
        let (a, b) = (BlockPos::new(0, 64, 0), BlockPos::new(1, 64, 0));
        let (left, right, shared) = (ContainerId::next(), ContainerId::next(), ContainerId::next());
        registry.register(left, &[a]);
        registry.register(right, &[b]);
        registry.register(shared, &[a, b]);
        let first = RecordingViewer::new().as_viewer();
        let second = RecordingViewer::new().as_viewer();
        let log = Broadcasts::default();

        registry.add_viewer(left, ViewerHandle::new(&first), recorder(&log)).unwrap();
        registry.add_viewer(right, ViewerHandle::new(&second), recorder(&log)).unwrap();
        log.lock().clear();
        registry.rehome(&[left, right], shared, recorder(&log));

        assert_eq!(
            *log.lock(),
            vec![
                (vec![a], BlockAction::Close),
                (vec![b], BlockAction::Close),
                (vec![a, b], BlockAction::Open),
            ]
        );
        assert_eq!(registry.viewer_count(shared), 2);
        assert!(!registry.is_registered(left));
        assert!(!registry.is_registered(right));
    }

    #[test]
    fn unregister_closes_open_containers() {
        let registry = ViewerRegistry::new();
        let id = registered(&registry);
        let viewer = RecordingViewer::new().as_viewer();
        let log = Broadcasts::default();

        registry.add_viewer(id, ViewerHandle::new(&viewer), recorder(&log)).unwrap();
        let former = registry.unregister(id, recorder(&log));
        assert_eq!(former.len(), 1);
        assert_eq!(log.lock().last().map(|(_, a)| *a), Some(BlockAction::Close));
        assert!(registry.is_empty());
    }
}
