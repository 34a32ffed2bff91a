//! A simple container implementation backed by a Vec.

use cinder_registry::ItemStack;

use super::Container;

/// A simple container that stores items in a fixed-size vector.
#[derive(Debug, Clone)]
pub struct SimpleContainer {
    items: Vec<ItemStack>,
    revision: u64,
}

impl SimpleContainer {
    /// Creates a new container with the given number of slots.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            items: (0..size).map(|_| ItemStack::empty()).collect(),
            revision: 0,
        }
    }

    /// A counter bumped on every change, for callers that need to know whether the contents
    /// changed since they last looked.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// All slots in order.
    #[must_use]
    pub fn items(&self) -> &[ItemStack] {
        &self.items
    }
}

impl Container for SimpleContainer {
    fn size(&self) -> usize {
        self.items.len()
    }

    fn get_item(&self, slot: usize) -> &ItemStack {
        &self.items[slot]
    }

    fn get_item_mut(&mut self, slot: usize) -> &mut ItemStack {
        &mut self.items[slot]
    }

    fn set_item(&mut self, slot: usize, item: ItemStack) {
        self.items[slot] = item;
        self.set_changed();
    }

    fn set_changed(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    fn clear(&mut self) {
        for item in &mut self.items {
            *item = ItemStack::empty();
        }
        self.set_changed();
    }
}
