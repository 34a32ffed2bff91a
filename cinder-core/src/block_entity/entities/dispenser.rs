//! Dispenser block entity implementation.

use std::{any::Any, sync::Arc};

use cinder_utils::BlockPos;
use simdnbt::owned::{NbtCompound, NbtTag};

use crate::{
    block_entity::{BlockEntity, BlockEntityKind, nbt},
    inventory::Inventory,
    viewer::ViewerRegistry,
};

/// The number of slots of a dispenser.
pub const DISPENSER_SIZE: usize = 9;

/// Block entity for dispensers.
pub struct DispenserBlockEntity {
    pos: BlockPos,
    inventory: Arc<Inventory>,
    custom_name: Option<String>,
}

impl DispenserBlockEntity {
    /// Creates a new dispenser block entity.
    #[must_use]
    pub fn new(pos: BlockPos, viewers: &Arc<ViewerRegistry>) -> Self {
        Self {
            pos,
            inventory: Inventory::new(DISPENSER_SIZE, viewers.clone(), &[pos]),
            custom_name: None,
        }
    }

    /// The name shown instead of the default title.
    #[must_use]
    pub fn custom_name(&self) -> Option<&str> {
        self.custom_name.as_deref()
    }

    /// Sets or clears the custom name. An empty name clears it.
    pub fn set_custom_name(&mut self, name: Option<String>) {
        self.custom_name = name.filter(|name| !name.is_empty());
    }
}

impl BlockEntity for DispenserBlockEntity {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn get_type(&self) -> BlockEntityKind {
        BlockEntityKind::Dispenser
    }

    fn get_block_pos(&self) -> BlockPos {
        self.pos
    }

    fn inventory(&self) -> Option<&Arc<Inventory>> {
        Some(&self.inventory)
    }

    fn load_additional(&mut self, nbt: &NbtCompound) {
        for (slot, stack) in nbt::read_items(nbt) {
            self.inventory.fill_silently(slot, [stack]);
        }
        self.set_custom_name(nbt::read_string(nbt, "CustomName"));
    }

    fn save_additional(&self, nbt: &mut NbtCompound) {
        nbt::write_items(nbt, &self.inventory.items());
        if let Some(name) = &self.custom_name {
            nbt.insert("CustomName", NbtTag::String(name.clone().into()));
        }
    }
}
