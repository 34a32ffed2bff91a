//! Furnace, blast furnace and smoker block entities.

use std::{any::Any, sync::Arc};

use cinder_utils::BlockPos;
use simdnbt::owned::{NbtCompound, NbtTag};

use crate::{
    block_entity::{BlockEntity, BlockEntityKind, nbt},
    inventory::Inventory,
    viewer::ViewerRegistry,
};

/// Input, fuel and output.
pub const SMELTER_SIZE: usize = 3;

/// Timers and experience of a smelter, all counted in ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmeltingProgress {
    /// Ticks of fuel left.
    pub burn_time: i16,
    /// Total ticks the current fuel item burns for.
    pub burn_duration: i16,
    /// Ticks the current input has cooked for.
    pub cook_time: i16,
    /// Experience stored for the next collection.
    pub stored_xp: i16,
}

/// Block entity shared by furnaces, blast furnaces and smokers.
pub struct SmelterBlockEntity {
    kind: BlockEntityKind,
    pos: BlockPos,
    inventory: Arc<Inventory>,
    progress: SmeltingProgress,
}

impl SmelterBlockEntity {
    /// Creates an idle smelter of the given kind.
    #[must_use]
    pub fn new(kind: BlockEntityKind, pos: BlockPos, viewers: &Arc<ViewerRegistry>) -> Self {
        debug_assert!(matches!(
            kind,
            BlockEntityKind::Furnace | BlockEntityKind::BlastFurnace | BlockEntityKind::Smoker
        ));
        Self {
            kind,
            pos,
            inventory: Inventory::new(SMELTER_SIZE, viewers.clone(), &[pos]),
            progress: SmeltingProgress::default(),
        }
    }

    /// The current timers.
    #[must_use]
    pub fn progress(&self) -> SmeltingProgress {
        self.progress
    }

    /// Replaces the timers.
    pub fn set_progress(&mut self, progress: SmeltingProgress) {
        self.progress = progress;
    }

    /// Returns true while fuel is burning.
    #[must_use]
    pub fn is_lit(&self) -> bool {
        self.progress.burn_time > 0
    }
}

impl BlockEntity for SmelterBlockEntity {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn get_type(&self) -> BlockEntityKind {
        self.kind
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
        self.progress = SmeltingProgress {
            burn_time: nbt::read_i16(nbt, "BurnTime").unwrap_or(0),
            burn_duration: nbt::read_i16(nbt, "BurnDuration").unwrap_or(0),
            cook_time: nbt::read_i16(nbt, "CookTime").unwrap_or(0),
            stored_xp: nbt::read_i16(nbt, "StoredXPInt").unwrap_or(0),
        };
    }

    fn save_additional(&self, nbt: &mut NbtCompound) {
        nbt::write_items(nbt, &self.inventory.items());
        nbt.insert("BurnTime", NbtTag::Short(self.progress.burn_time));
        nbt.insert("BurnDuration", NbtTag::Short(self.progress.burn_duration));
        nbt.insert("CookTime", NbtTag::Short(self.progress.cook_time));
        nbt.insert("StoredXPInt", NbtTag::Short(self.progress.stored_xp));
    }
}
