//! Hopper block entity implementation.

use std::{any::Any, sync::Arc};

use cinder_utils::BlockPos;
use simdnbt::owned::{NbtCompound, NbtTag};

use crate::{
    block_entity::{BlockEntity, BlockEntityKind, nbt},
    inventory::Inventory,
    viewer::ViewerRegistry,
};

/// The number of slots of a hopper.
pub const HOPPER_SIZE: usize = 5;

/// Block entity for hoppers.
pub struct HopperBlockEntity {
    pos: BlockPos,
    inventory: Arc<Inventory>,
    transfer_cooldown: i32,
}

impl HopperBlockEntity {
    /// Creates a new hopper block entity.
    #[must_use]
    pub fn new(pos: BlockPos, viewers: &Arc<ViewerRegistry>) -> Self {
        Self {
            pos,
            inventory: Inventory::new(HOPPER_SIZE, viewers.clone(), &[pos]),
            transfer_cooldown: -1,
        }
    }

    /// Ticks left until the hopper may move items again.
    #[must_use]
    pub fn transfer_cooldown(&self) -> i32 {
        self.transfer_cooldown
    }

    /// Sets the transfer cooldown.
    pub fn set_cooldown(&mut self, cooldown: i32) {
        self.transfer_cooldown = cooldown;
    }

    /// Returns true while the hopper is waiting to move items.
    #[must_use]
    pub fn is_on_cooldown(&self) -> bool {
        self.transfer_cooldown > 0
    }
}

impl BlockEntity for HopperBlockEntity {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn get_type(&self) -> BlockEntityKind {
        BlockEntityKind::Hopper
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
        self.transfer_cooldown = nbt::read_i32(nbt, "TransferCooldown").unwrap_or(0);
    }

    fn save_additional(&self, nbt: &mut NbtCompound) {
        nbt::write_items(nbt, &self.inventory.items());
        nbt.insert("TransferCooldown", NbtTag::Int(self.transfer_cooldown));
    }
}

#[cfg(test)]
mod tests {
    use cinder_registry::ItemStack;
    use cinder_utils::Identifier;

    use super::*;

    #[test]
    fn items_and_cooldown_persist() {
        let viewers = Arc::new(ViewerRegistry::new());
        let pos = BlockPos::new(4, 70, -2);
        let mut hopper = HopperBlockEntity::new(pos, &viewers);
        let iron = ItemStack::new(Identifier::vanilla_static("iron_ingot"), 9);
        hopper.inventory.set_item(4, iron.clone()).unwrap();
        hopper.set_cooldown(8);

        let mut nbt = NbtCompound::new();
        hopper.save_additional(&mut nbt);
        let mut loaded = HopperBlockEntity::new(pos, &viewers);
        loaded.load_additional(&nbt);

        assert_eq!(loaded.inventory.item(4).unwrap(), iron);
        assert_eq!(loaded.transfer_cooldown(), 8);
        assert!(loaded.is_on_cooldown());
    }

    #[test]
    fn slots_past_the_end_are_ignored() {
        let viewers = Arc::new(ViewerRegistry::new());
        let mut hopper = HopperBlockEntity::new(BlockPos::new(0, 0, 0), &viewers);
        let mut item = ItemStack::new(Identifier::vanilla_static("stone"), 1).to_nbt();
        item.insert("Slot", NbtTag::Byte(9));
        let mut nbt = NbtCompound::new();
        nbt.insert(
            "Items",
            NbtTag::List(simdnbt::owned::NbtList::Compound(vec![item])),
        );
        hopper.load_additional(&nbt);
        assert!(hopper.inventory.is_empty());
        assert_eq!(hopper.transfer_cooldown(), 0);
    }
}
