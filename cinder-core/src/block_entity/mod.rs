//! Block entities: per-position data attached to a block, such as container contents.

pub mod entities;
pub mod nbt;

use std::{any::Any, sync::Arc};

use cinder_utils::BlockPos;
use simdnbt::owned::{NbtCompound, NbtTag};

use crate::{
    block_entity::entities::{
        ChestBlockEntity, DispenserBlockEntity, HopperBlockEntity, NoteBlockEntity, SmelterBlockEntity,
    },
    inventory::Inventory,
    viewer::ViewerRegistry,
};

/// The kinds of block entity the engine knows how to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockEntityKind {
    /// A chest, possibly paired with a neighbour.
    Chest,
    /// A furnace.
    Furnace,
    /// A blast furnace.
    BlastFurnace,
    /// A smoker.
    Smoker,
    /// A hopper.
    Hopper,
    /// A dispenser.
    Dispenser,
    /// A note block.
    NoteBlock,
}

impl BlockEntityKind {
    /// All kinds.
    pub const ALL: [BlockEntityKind; 7] = [
        BlockEntityKind::Chest,
        BlockEntityKind::Furnace,
        BlockEntityKind::BlastFurnace,
        BlockEntityKind::Smoker,
        BlockEntityKind::Hopper,
        BlockEntityKind::Dispenser,
        BlockEntityKind::NoteBlock,
    ];

    /// The id stored in the record's `id` field.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            BlockEntityKind::Chest => "Chest",
            BlockEntityKind::Furnace => "Furnace",
            BlockEntityKind::BlastFurnace => "BlastFurnace",
            BlockEntityKind::Smoker => "Smoker",
            BlockEntityKind::Hopper => "Hopper",
            BlockEntityKind::Dispenser => "Dispenser",
            BlockEntityKind::NoteBlock => "Music",
        }
    }

    /// Looks up a kind by its stored id.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// Creates an empty block entity of this kind.
    #[must_use]
    pub fn create(self, pos: BlockPos, viewers: &Arc<ViewerRegistry>) -> Box<dyn BlockEntity> {
        match self {
            BlockEntityKind::Chest => Box::new(ChestBlockEntity::new(pos, viewers)),
            BlockEntityKind::Furnace | BlockEntityKind::BlastFurnace | BlockEntityKind::Smoker => {
                Box::new(SmelterBlockEntity::new(self, pos, viewers))
            }
            BlockEntityKind::Hopper => Box::new(HopperBlockEntity::new(pos, viewers)),
            BlockEntityKind::Dispenser => Box::new(DispenserBlockEntity::new(pos, viewers)),
            BlockEntityKind::NoteBlock => Box::new(NoteBlockEntity::new(pos)),
        }
    }
}

/// Data attached to a single block position.
pub trait BlockEntity: Any + Send + Sync {
    /// Returns self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns self as mutable `Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// The kind of this block entity.
    fn get_type(&self) -> BlockEntityKind;

    /// The position this entity is attached to.
    fn get_block_pos(&self) -> BlockPos;

    /// The inventory, for entities that hold items.
    fn inventory(&self) -> Option<&Arc<Inventory>> {
        None
    }

    /// Reads entity-specific fields. Missing or mistyped fields keep their defaults.
    fn load_additional(&mut self, nbt: &NbtCompound);

    /// Writes entity-specific fields.
    fn save_additional(&self, nbt: &mut NbtCompound);
}

/// Writes a full block entity record: `id`, `x`, `y`, `z` and the entity's own fields.
#[must_use]
pub fn save_block_entity(entity: &dyn BlockEntity) -> NbtCompound {
    let pos = entity.get_block_pos();
    let mut nbt = NbtCompound::new();
    nbt.insert("id", NbtTag::String(entity.get_type().id().to_string().into()));
    nbt.insert("x", NbtTag::Int(pos.x()));
    nbt.insert("y", NbtTag::Int(pos.y()));
    nbt.insert("z", NbtTag::Int(pos.z()));
    entity.save_additional(&mut nbt);
    nbt
}

/// Reads a block entity record.
///
/// Returns `None` if the id is unknown or the position is missing; such records are
/// skipped rather than failing the chunk they belong to.
#[must_use]
pub fn load_block_entity(
    nbt: &NbtCompound,
    viewers: &Arc<ViewerRegistry>,
) -> Option<Box<dyn BlockEntity>> {
    let Some(id) = nbt::read_string(nbt, "id") else {
        log::warn!("Skipping block entity record without an id");
        return None;
    };
    let Some(kind) = BlockEntityKind::from_id(&id) else {
        log::warn!("Skipping block entity with unknown id {id}");
        return None;
    };
    let (Some(x), Some(y), Some(z)) = (
        nbt::read_i32(nbt, "x"),
        nbt::read_i32(nbt, "y"),
        nbt::read_i32(nbt, "z"),
    ) else {
        log::warn!("Skipping {id} block entity without a position");
        return None;
    };

    let mut entity = kind.create(BlockPos::new(x, y, z), viewers);
    entity.load_additional(nbt);
    Some(entity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for kind in BlockEntityKind::ALL {
            assert_eq!(BlockEntityKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(BlockEntityKind::from_id("Beacon"), None);
    }

    #[test]
    fn records_without_position_are_skipped() {
        let viewers = Arc::new(ViewerRegistry::new());
        let mut nbt = NbtCompound::new();
        nbt.insert("id", NbtTag::String("Music".to_string().into()));
        nbt.insert("x", NbtTag::Int(1));
        assert!(load_block_entity(&nbt, &viewers).is_none());

        nbt.insert("y", NbtTag::Int(2));
        nbt.insert("z", NbtTag::Int(3));
        let entity = load_block_entity(&nbt, &viewers).expect("record is complete");
        assert_eq!(entity.get_type(), BlockEntityKind::NoteBlock);
        assert_eq!(entity.get_block_pos(), BlockPos::new(1, 2, 3));
    }
}
