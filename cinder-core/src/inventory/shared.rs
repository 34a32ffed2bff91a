//! Inventories shared between block entities and the sessions viewing them.

use std::{ops::Range, sync::Arc};

use cinder_registry::ItemStack;
use cinder_utils::{BlockPos, locks::SyncMutex};

use super::{Container, ContainerId, SimpleContainer};
use crate::{error::InventoryError, viewer::ViewerRegistry};

/// A fixed-size inventory whose changes are forwarded to its viewers.
///
/// The slot lock is released before viewers are notified, so a viewer may read the
/// inventory from inside its callback.
pub struct Inventory {
    id: ContainerId,
    container: SyncMutex<SimpleContainer>,
    viewers: Arc<ViewerRegistry>,
}

impl Inventory {
    /// Creates an empty inventory and registers it at `positions`.
    #[must_use]
    pub fn new(size: usize, viewers: Arc<ViewerRegistry>, positions: &[BlockPos]) -> Arc<Self> {
        let id = ContainerId::next();
        viewers.register(id, positions);
        Arc::new(Self {
            id,
            container: SyncMutex::new(SimpleContainer::new(size)),
            viewers,
        })
    }

    /// The id viewers are tracked under.
    #[must_use]
    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// The viewer registry this inventory reports to.
    #[must_use]
    pub fn viewers(&self) -> &Arc<ViewerRegistry> {
        &self.viewers
    }

    /// The number of slots.
    #[must_use]
    pub fn size(&self) -> usize {
        self.container.lock().size()
    }

    /// Returns true if every slot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.container.lock().is_empty()
    }

    /// Returns a copy of the stack in a slot.
    pub fn item(&self, slot: usize) -> Result<ItemStack, InventoryError> {
        let container = self.container.lock();
        Self::check_slot(&container, slot)?;
        Ok(container.get_item(slot).clone())
    }

    /// Returns a copy of every slot.
    #[must_use]
    pub fn items(&self) -> Vec<ItemStack> {
        self.container.lock().items().to_vec()
    }

    /// Replaces the stack in a slot.
    pub fn set_item(&self, slot: usize, stack: ItemStack) -> Result<(), InventoryError> {
        self.modify(|container| {
            Self::check_slot(container, slot)?;
            container.set_item(slot, stack);
            Ok(vec![slot])
        })
    }

    /// Adds as much of `stack` as fits and returns what did not.
    pub fn add_item(&self, mut stack: ItemStack) -> ItemStack {
        let result: Result<(), InventoryError> =
            self.modify(|container| Ok(container.add_item(&mut stack)));
        debug_assert!(result.is_ok());
        stack
    }

    /// Removes up to `count` items from a slot.
    pub fn remove_item(&self, slot: usize, count: i32) -> Result<ItemStack, InventoryError> {
        let mut removed = ItemStack::empty();
        self.modify(|container| {
            Self::check_slot(container, slot)?;
            removed = container.remove_item(slot, count);
            Ok(if removed.is_empty() { Vec::new() } else { vec![slot] })
        })?;
        Ok(removed)
    }

    /// Empties the slots in `range` and returns their non-empty stacks in slot order.
    ///
    /// Slots past the end of the inventory are ignored.
    pub fn take_range(&self, range: Range<usize>) -> Vec<ItemStack> {
        let mut taken = Vec::new();
        let result: Result<(), InventoryError> = self.modify(|container| {
            let end = range.end.min(container.size());
            let mut changed = Vec::new();
            for slot in range.start..end {
                let stack = container.remove_item_no_update(slot);
                if !stack.is_empty() {
                    taken.push(stack);
                    changed.push(slot);
                }
            }
            if !changed.is_empty() {
                container.set_changed();
            }
            Ok(changed)
        });
        debug_assert!(result.is_ok());
        taken
    }

    /// Empties the inventory and returns its non-empty stacks.
    pub fn clear(&self) -> Vec<ItemStack> {
        self.take_range(0..usize::MAX)
    }

    /// Copies `items` into the slots starting at `offset` without notifying viewers.
    ///
    /// Used while building an inventory that nobody can be viewing yet.
    pub(crate) fn fill_silently(&self, offset: usize, items: impl IntoIterator<Item = ItemStack>) {
        let mut container = self.container.lock();
        for (slot, stack) in (offset..).zip(items) {
            if slot >= container.size() {
                break;
            }
            container.set_item(slot, stack);
        }
        container.set_changed();
    }

    /// Empties every slot without notifying viewers and returns the previous contents, one
    /// entry per slot.
    ///
    /// Used when the contents move to another inventory that the viewers are re-homed onto.
    pub(crate) fn drain_silently(&self) -> Vec<ItemStack> {
        let mut container = self.container.lock();
        let drained = (0..container.size())
            .map(|slot| container.remove_item_no_update(slot))
            .collect();
        container.set_changed();
        drained
    }

    /// A counter that changes whenever the contents change.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.container.lock().revision()
    }

    fn check_slot(container: &SimpleContainer, slot: usize) -> Result<(), InventoryError> {
        if slot < container.size() {
            Ok(())
        } else {
            Err(InventoryError::SlotOutOfRange {
                slot,
                size: container.size(),
            })
        }
    }

    fn modify(
        &self,
        f: impl FnOnce(&mut SimpleContainer) -> Result<Vec<usize>, InventoryError>,
    ) -> Result<(), InventoryError> {
        let changes: Vec<(usize, ItemStack)> = {
            let mut container = self.container.lock();
            f(&mut container)?
                .into_iter()
                .map(|slot| (slot, container.get_item(slot).clone()))
                .collect()
        };
        for (slot, stack) in &changes {
            self.viewers.notify_slot_change(self.id, *slot, stack);
        }
        Ok(())
    }
}

impl Drop for Inventory {
    fn drop(&mut self) {
        self.viewers.forget(self.id);
    }
}

impl std::fmt::Debug for Inventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inventory")
            .field("id", &self.id)
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}
