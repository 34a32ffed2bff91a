//! Block behavior implementations for the built-in blocks.

mod chest_block;
mod container_block;
mod liquid_block;
mod note_block;
mod waterloggable_block;

use std::sync::Arc;

use cinder_utils::Identifier;

pub use chest_block::ChestBlock;
pub use container_block::ContainerBlock;
pub use liquid_block::LiquidBlock;
pub use note_block::NoteBlock;
pub use waterloggable_block::WaterloggableBlock;

use crate::{behavior::BlockBehaviours, block_entity::BlockEntityKind};

/// Blocks that keep a liquid in their liquid layer.
const WATERLOGGABLE: [&str; 10] = [
    "oak_stairs",
    "stone_stairs",
    "cobblestone_wall",
    "oak_fence",
    "oak_slab",
    "stone_slab",
    "glass_pane",
    "iron_bars",
    "ladder",
    "oak_sign",
];

/// Registers every built-in behaviour.
pub fn register_all(behaviours: &mut BlockBehaviours) {
    behaviours.register(Identifier::vanilla_static("chest"), Arc::new(ChestBlock));
    behaviours.register(Identifier::vanilla_static("trapped_chest"), Arc::new(ChestBlock));

    for (name, kind) in [
        ("furnace", BlockEntityKind::Furnace),
        ("lit_furnace", BlockEntityKind::Furnace),
        ("blast_furnace", BlockEntityKind::BlastFurnace),
        ("lit_blast_furnace", BlockEntityKind::BlastFurnace),
        ("smoker", BlockEntityKind::Smoker),
        ("lit_smoker", BlockEntityKind::Smoker),
        ("hopper", BlockEntityKind::Hopper),
        ("dispenser", BlockEntityKind::Dispenser),
    ] {
        behaviours.register(
            Identifier::vanilla_static(name),
            Arc::new(ContainerBlock::new(kind, kind == BlockEntityKind::Hopper)),
        );
    }

    behaviours.register(Identifier::vanilla_static("noteblock"), Arc::new(NoteBlock));

    for (name, delay) in [
        ("water", 5),
        ("flowing_water", 5),
        ("lava", 30),
        ("flowing_lava", 30),
    ] {
        behaviours.register(Identifier::vanilla_static(name), Arc::new(LiquidBlock::new(delay)));
    }

    for name in WATERLOGGABLE {
        behaviours.register(Identifier::vanilla_static(name), Arc::new(WaterloggableBlock));
    }
}
