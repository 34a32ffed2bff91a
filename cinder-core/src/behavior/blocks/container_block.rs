//! Behavior for single-block containers: furnaces, smokers, hoppers and dispensers.

use std::sync::Arc;

use cinder_registry::BlockState;
use cinder_utils::BlockPos;

use crate::{
    behavior::{BlockBehaviour, BlockEntityProvider, LiquidDisplacer},
    block_entity::BlockEntityKind,
    viewer::Viewer,
    world::World,
};

use super::waterloggable_block::is_water;

/// Behavior for a block whose block entity holds an inventory of its own.
pub struct ContainerBlock {
    kind: BlockEntityKind,
    waterloggable: bool,
}

impl ContainerBlock {
    /// Creates the behavior of a container carrying a `kind` block entity.
    #[must_use]
    pub const fn new(kind: BlockEntityKind, waterloggable: bool) -> Self {
        Self {
            kind,
            waterloggable,
        }
    }
}

impl BlockBehaviour for ContainerBlock {
    fn use_without_item(
        &self,
        world: &World,
        pos: BlockPos,
        _state: &BlockState,
        user: &Arc<dyn Viewer>,
    ) -> bool {
        world.open_container(pos, user).is_some()
    }

    fn as_block_entity_provider(&self) -> Option<&dyn BlockEntityProvider> {
        Some(self)
    }

    fn as_liquid_displacer(&self) -> Option<&dyn LiquidDisplacer> {
        self.waterloggable.then_some(self as &dyn LiquidDisplacer)
    }
}

impl BlockEntityProvider for ContainerBlock {
    fn block_entity_kind(&self) -> BlockEntityKind {
        self.kind
    }
}

impl LiquidDisplacer for ContainerBlock {
    fn can_displace(&self, liquid: &BlockState) -> bool {
        is_water(liquid)
    }
}
