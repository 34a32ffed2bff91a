//! Container trait for item storage.

use cinder_registry::ItemStack;

/// A trait for objects that can store items in slots.
///
/// This is the base abstraction for anything that holds items: chests, furnaces,
/// hoppers, etc.
pub trait Container: Send + Sync {
    /// Returns the number of slots in this container.
    fn size(&self) -> usize;

    /// Returns true if all slots are empty.
    fn is_empty(&self) -> bool {
        (0..self.size()).all(|slot| self.get_item(slot).is_empty())
    }

    /// Gets the item in the given slot.
    fn get_item(&self, slot: usize) -> &ItemStack;

    /// Gets a mutable reference to the item in the given slot.
    fn get_item_mut(&mut self, slot: usize) -> &mut ItemStack;

    /// Removes up to `count` items from the given slot and returns them.
    fn remove_item(&mut self, slot: usize, count: i32) -> ItemStack {
        let item = self.get_item_mut(slot);
        if item.is_empty() || count <= 0 {
            return ItemStack::empty();
        }
        let result = item.split(count);
        if item.is_empty() {
            *item = ItemStack::empty();
        }
        if !result.is_empty() {
            self.set_changed();
        }
        result
    }

    /// Removes and returns the entire item stack from the given slot without triggering updates.
    fn remove_item_no_update(&mut self, slot: usize) -> ItemStack {
        self.get_item_mut(slot).copy_and_clear()
    }

    /// Sets the item in the given slot.
    fn set_item(&mut self, slot: usize, item: ItemStack);

    /// Returns the maximum stack size this container allows.
    fn max_stack_size(&self) -> i32 {
        64
    }

    /// Returns the maximum stack size for a specific item in this container.
    fn max_stack_size_for(&self, item: &ItemStack) -> i32 {
        self.max_stack_size().min(item.max_stack_size())
    }

    /// Called when the container contents change.
    fn set_changed(&mut self);

    /// Clears all items from this container.
    fn clear(&mut self) {
        for i in 0..self.size() {
            self.set_item(i, ItemStack::empty());
        }
    }

    /// Moves as much of `stack` as fits into this container.
    ///
    /// Existing stacks of the same item are topped up first, then empty slots are filled
    /// in order. Returns the slots that changed; whatever did not fit stays in `stack`.
    fn add_item(&mut self, stack: &mut ItemStack) -> Vec<usize> {
        let mut changed = Vec::new();
        let max = self.max_stack_size_for(stack);

        for slot in 0..self.size() {
            if stack.is_empty() {
                break;
            }
            let existing = self.get_item_mut(slot);
            if existing.is_empty() || !existing.is_same_item(stack) || existing.count() >= max {
                continue;
            }
            let moved = (max - existing.count()).min(stack.count());
            existing.grow(moved);
            stack.shrink(moved);
            changed.push(slot);
        }

        for slot in 0..self.size() {
            if stack.is_empty() {
                break;
            }
            if !self.get_item(slot).is_empty() {
                continue;
            }
            let moved = stack.split(max);
            self.set_item(slot, moved);
            changed.push(slot);
        }

        if !changed.is_empty() {
            self.set_changed();
        }
        changed
    }
}
