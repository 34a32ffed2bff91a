//! Chest block behavior implementation.
//!
//! A chest pairs with a same-facing chest placed beside it and unpairs when its partner is
//! removed. The pairing itself lives in [`crate::world`], which locks both chunks.

use std::sync::Arc;

use cinder_registry::BlockState;
use cinder_utils::BlockPos;

use crate::{
    behavior::{BlockBehaviour, BlockEntityProvider, LiquidDisplacer},
    block_entity::{BlockEntity, BlockEntityKind, entities::ChestBlockEntity},
    viewer::Viewer,
    world::World,
};

use super::waterloggable_block::is_water;

/// Behavior for chests.
pub struct ChestBlock;

impl BlockBehaviour for ChestBlock {
    fn neighbour_update(&self, world: &World, pos: BlockPos, _state: &BlockState, changed: BlockPos) {
        if changed != pos {
            world.update_chest_pairing(pos, changed);
        }
    }

    fn use_without_item(
        &self,
        world: &World,
        pos: BlockPos,
        _state: &BlockState,
        user: &Arc<dyn Viewer>,
    ) -> bool {
        world.open_container(pos, user).is_some()
    }

    fn on_remove(
        &self,
        world: &World,
        pos: BlockPos,
        _state: &BlockState,
        entity: Option<Box<dyn BlockEntity>>,
    ) {
        let Some(entity) = entity else {
            return;
        };
        let Some(chest) = entity.as_any().downcast_ref::<ChestBlockEntity>() else {
            return;
        };
        let inventory = chest.chest_inventory();
        world.drop_items(pos, inventory.take_range(chest.own_half()));
        // The surviving half keeps the shared inventory and its viewers until it unpairs.
        if !chest.is_linked() {
            world.close_inventory(inventory);
        }
    }

    fn as_block_entity_provider(&self) -> Option<&dyn BlockEntityProvider> {
        Some(self)
    }

    fn as_liquid_displacer(&self) -> Option<&dyn LiquidDisplacer> {
        Some(self)
    }
}

impl BlockEntityProvider for ChestBlock {
    fn block_entity_kind(&self) -> BlockEntityKind {
        BlockEntityKind::Chest
    }
}

impl LiquidDisplacer for ChestBlock {
    fn can_displace(&self, liquid: &BlockState) -> bool {
        is_water(liquid)
    }
}
