//! Chest block entity.
//!
//! A chest holds 27 slots on its own. Two chests side by side pair into one 54-slot
//! inventory shared by both entities; the lead half owns slots `0..27` and its partner owns
//! `27..54`. A paired chest whose partner is not loaded keeps its pairing but works on its
//! own 27 slots until the partner comes back.

use std::{any::Any, ops::Range, sync::Arc};

use cinder_utils::BlockPos;
use simdnbt::owned::{NbtCompound, NbtTag};

use crate::{
    block_entity::{BlockEntity, BlockEntityKind, nbt},
    inventory::{DOUBLE_CHEST_SIZE, Inventory, SINGLE_CHEST_SIZE},
    viewer::ViewerRegistry,
};

/// The link between two paired chest halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChestPairing {
    /// The position of the other half.
    pub partner: BlockPos,
    /// Whether this half owns the first 27 slots of the shared inventory.
    pub lead: bool,
}

/// Block entity for chests.
pub struct ChestBlockEntity {
    pos: BlockPos,
    custom_name: Option<String>,
    pairing: Option<ChestPairing>,
    inventory: Arc<Inventory>,
}

impl ChestBlockEntity {
    /// Creates an empty, unpaired chest.
    #[must_use]
    pub fn new(pos: BlockPos, viewers: &Arc<ViewerRegistry>) -> Self {
        Self {
            pos,
            custom_name: None,
            pairing: None,
            inventory: Inventory::new(SINGLE_CHEST_SIZE, viewers.clone(), &[pos]),
        }
    }

    /// The pairing, if this chest is one half of a pair.
    #[must_use]
    pub fn pairing(&self) -> Option<ChestPairing> {
        self.pairing
    }

    /// The shared inventory.
    #[must_use]
    pub fn chest_inventory(&self) -> &Arc<Inventory> {
        &self.inventory
    }

    /// The custom name shown instead of the default title.
    #[must_use]
    pub fn custom_name(&self) -> Option<&str> {
        self.custom_name.as_deref()
    }

    /// Sets or clears the custom name.
    pub fn set_custom_name(&mut self, name: Option<String>) {
        self.custom_name = name.filter(|name| !name.is_empty());
    }

    /// Returns true if this chest is paired and shares a 54-slot inventory with its partner.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.pairing.is_some() && self.inventory.size() == DOUBLE_CHEST_SIZE
    }

    /// The slots of the current inventory that belong to this half.
    #[must_use]
    pub fn own_half(&self) -> Range<usize> {
        match self.pairing {
            Some(pairing) if self.is_linked() => {
                if pairing.lead {
                    0..SINGLE_CHEST_SIZE
                } else {
                    SINGLE_CHEST_SIZE..DOUBLE_CHEST_SIZE
                }
            }
            _ => 0..self.inventory.size(),
        }
    }

    /// Links this half to a shared inventory.
    pub(crate) fn link(&mut self, pairing: ChestPairing, inventory: Arc<Inventory>) {
        self.pairing = Some(pairing);
        self.inventory = inventory;
    }

    /// Gives this half its own inventory while keeping the pairing, for when the partner is
    /// about to be unloaded.
    pub(crate) fn detach(&mut self, inventory: Arc<Inventory>) {
        self.inventory = inventory;
    }

    /// Drops the pairing and gives this chest its own inventory.
    pub(crate) fn unpair(&mut self, inventory: Arc<Inventory>) {
        self.pairing = None;
        self.inventory = inventory;
    }
}

impl BlockEntity for ChestBlockEntity {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn get_type(&self) -> BlockEntityKind {
        BlockEntityKind::Chest
    }

    fn get_block_pos(&self) -> BlockPos {
        self.pos
    }

    fn inventory(&self) -> Option<&Arc<Inventory>> {
        Some(&self.inventory)
    }

    fn load_additional(&mut self, nbt: &NbtCompound) {
        self.set_custom_name(nbt::read_string(nbt, "CustomName"));

        self.pairing = match (nbt::read_i32(nbt, "pairx"), nbt::read_i32(nbt, "pairz")) {
            (Some(x), Some(z)) => {
                let partner = BlockPos::new(x, self.pos.y(), z);
                let lead = match nbt::read_int(nbt, "pairlead") {
                    Some(lead) => lead != 0,
                    None => (self.pos.x(), self.pos.z()) < (x, z),
                };
                Some(ChestPairing { partner, lead })
            }
            _ => None,
        };

        let items = nbt::read_items(nbt);
        // Records written with the whole pair's contents carry slots past 27; keep only
        // this half.
        let offset = if items.iter().any(|(slot, _)| *slot >= SINGLE_CHEST_SIZE) {
            match self.pairing {
                Some(ChestPairing { lead: false, .. }) => SINGLE_CHEST_SIZE,
                _ => 0,
            }
        } else {
            0
        };
        for (slot, stack) in items {
            if let Some(slot) = slot.checked_sub(offset)
                && slot < SINGLE_CHEST_SIZE
            {
                self.inventory.fill_silently(slot, [stack]);
            }
        }
    }

    fn save_additional(&self, nbt: &mut NbtCompound) {
        let items = self.inventory.items();
        nbt::write_items(nbt, &items[self.own_half()]);
        if let Some(name) = &self.custom_name {
            nbt.insert("CustomName", NbtTag::String(name.clone().into()));
        }
        if let Some(pairing) = self.pairing {
            nbt.insert("pairx", NbtTag::Int(pairing.partner.x()));
            nbt.insert("pairz", NbtTag::Int(pairing.partner.z()));
            nbt.insert("pairlead", NbtTag::Byte(i8::from(pairing.lead)));
        }
    }
}

#[cfg(test)]
mod tests {
    use cinder_registry::ItemStack;
    use cinder_utils::Identifier;

    use super::*;

    fn gold(count: i32) -> ItemStack {
        ItemStack::new(Identifier::vanilla_static("gold_ingot"), count)
    }

    #[test]
    fn single_chest_persists_items_and_name() {
        let viewers = Arc::new(ViewerRegistry::new());
        let pos = BlockPos::new(10, 64, 10);
        let mut chest = ChestBlockEntity::new(pos, &viewers);
        chest.set_custom_name(Some("Loot".to_string()));
        chest.inventory.set_item(26, gold(7)).unwrap();

        let mut nbt = NbtCompound::new();
        chest.save_additional(&mut nbt);
        assert!(nbt.get("pairx").is_none());

        let mut loaded = ChestBlockEntity::new(pos, &viewers);
        loaded.load_additional(&nbt);
        assert_eq!(loaded.custom_name(), Some("Loot"));
        assert_eq!(loaded.inventory.item(26).unwrap(), gold(7));
        assert!(loaded.pairing().is_none());
    }

    #[test]
    fn linked_half_saves_only_its_own_slots() {
        let viewers = Arc::new(ViewerRegistry::new());
        let pos = BlockPos::new(1, 64, 0);
        let shared = Inventory::new(DOUBLE_CHEST_SIZE, viewers.clone(), &[]);
        shared.set_item(2, gold(1)).unwrap();
        shared.set_item(30, gold(2)).unwrap();

        let mut follower = ChestBlockEntity::new(pos, &viewers);
        follower.link(
            ChestPairing {
                partner: BlockPos::new(0, 64, 0),
                lead: false,
            },
            shared,
        );
        assert_eq!(follower.own_half(), 27..54);

        let mut nbt = NbtCompound::new();
        follower.save_additional(&mut nbt);
        let mut loaded = ChestBlockEntity::new(pos, &viewers);
        loaded.load_additional(&nbt);

        assert_eq!(
            loaded.pairing(),
            Some(ChestPairing {
                partner: BlockPos::new(0, 64, 0),
                lead: false
            })
        );
        assert!(!loaded.is_linked());
        assert_eq!(loaded.inventory.item(3).unwrap(), gold(2));
        assert_eq!(loaded.inventory.items().iter().filter(|s| !s.is_empty()).count(), 1);
    }

    #[test]
    fn missing_pairlead_is_derived_from_positions() {
        let viewers = Arc::new(ViewerRegistry::new());
        let mut nbt = NbtCompound::new();
        nbt.insert("pairx", NbtTag::Int(6));
        nbt.insert("pairz", NbtTag::Int(0));

        let mut west = ChestBlockEntity::new(BlockPos::new(5, 64, 0), &viewers);
        west.load_additional(&nbt);
        assert_eq!(west.pairing().map(|p| p.lead), Some(true));

        let mut nbt = NbtCompound::new();
        nbt.insert("pairx", NbtTag::Int(5));
        nbt.insert("pairz", NbtTag::Int(0));
        let mut east = ChestBlockEntity::new(BlockPos::new(6, 64, 0), &viewers);
        east.load_additional(&nbt);
        assert_eq!(east.pairing().map(|p| p.lead), Some(false));
    }

    #[test]
    fn whole_pair_records_keep_this_half() {
        let viewers = Arc::new(ViewerRegistry::new());
        let mut nbt = NbtCompound::new();
        nbt.insert("pairx", NbtTag::Int(5));
        nbt.insert("pairz", NbtTag::Int(0));
        nbt.insert("pairlead", NbtTag::Byte(0));
        let shared = Inventory::new(DOUBLE_CHEST_SIZE, viewers.clone(), &[]);
        shared.set_item(0, gold(1)).unwrap();
        shared.set_item(40, gold(4)).unwrap();
        nbt::write_items(&mut nbt, &shared.items());

        let mut chest = ChestBlockEntity::new(BlockPos::new(6, 64, 0), &viewers);
        chest.load_additional(&nbt);
        assert_eq!(chest.inventory.item(13).unwrap(), gold(4));
        assert_eq!(chest.inventory.items().iter().filter(|s| !s.is_empty()).count(), 1);
    }
}
