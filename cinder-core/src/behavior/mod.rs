//! Block behaviours: the callbacks the world invokes for specific blocks.
//!
//! A behaviour is looked up by block name. Optional capabilities are separate traits exposed
//! through the `as_*` accessors, so the world can ask "does this block carry a block
//! entity?" or "can this block hold a liquid?" without knowing the concrete type.
//!
//! Handlers run without any chunk lock held and may call back into the [`World`].

pub mod blocks;

use std::sync::Arc;

use cinder_registry::BlockState;
use cinder_utils::{BlockPos, Identifier};
use rustc_hash::FxHashMap;

use crate::{
    block_entity::{BlockEntity, BlockEntityKind},
    viewer::Viewer,
    world::World,
};

/// Behaviour shared by every block of one kind.
#[allow(unused_variables)]
pub trait BlockBehaviour: Send + Sync {
    /// Called when a block next to `pos`, or `pos` itself, changed.
    ///
    /// `changed` is the position that changed.
    fn neighbour_update(&self, world: &World, pos: BlockPos, state: &BlockState, changed: BlockPos) {}

    /// Called when an update scheduled for `pos` is due and the block is still `state`.
    fn scheduled_update(&self, world: &World, pos: BlockPos, state: &BlockState) {}

    /// Returns true if the block wants random ticks.
    fn ticks_randomly(&self) -> bool {
        false
    }

    /// Called for blocks that tick randomly when their position is picked.
    fn random_tick(&self, world: &World, pos: BlockPos, state: &BlockState) {}

    /// Called when `user` uses the block with an empty hand. Returns true if the use was
    /// handled.
    fn use_without_item(
        &self,
        world: &World,
        pos: BlockPos,
        state: &BlockState,
        user: &Arc<dyn Viewer>,
    ) -> bool {
        false
    }

    /// Called after the block at `pos` was replaced by a different block.
    ///
    /// `entity` is the block entity the block had. The default drops its inventory at `pos`
    /// and closes it for anyone still viewing it.
    fn on_remove(
        &self,
        world: &World,
        pos: BlockPos,
        state: &BlockState,
        entity: Option<Box<dyn BlockEntity>>,
    ) {
        if let Some(inventory) = entity.as_ref().and_then(|entity| entity.inventory()) {
            world.drop_items(pos, inventory.clear());
            world.close_inventory(inventory);
        }
    }

    /// The block entity capability.
    fn as_block_entity_provider(&self) -> Option<&dyn BlockEntityProvider> {
        None
    }

    /// The liquid capability.
    fn as_liquid(&self) -> Option<&dyn Liquid> {
        None
    }

    /// The liquid displacer capability.
    fn as_liquid_displacer(&self) -> Option<&dyn LiquidDisplacer> {
        None
    }
}

/// Blocks that carry a block entity.
pub trait BlockEntityProvider: Send + Sync {
    /// The kind of block entity created when the block is placed.
    fn block_entity_kind(&self) -> BlockEntityKind;
}

/// Blocks that are liquids.
pub trait Liquid: Send + Sync {
    /// Ticks between a change next to the liquid and its reaction.
    fn flow_delay(&self) -> u64;
}

/// Blocks that can share their position with a liquid.
pub trait LiquidDisplacer: Send + Sync {
    /// Returns true if `liquid` may stay in the block's liquid layer.
    fn can_displace(&self, liquid: &BlockState) -> bool;
}

/// The behaviour of blocks without one.
struct DefaultBehaviour;

impl BlockBehaviour for DefaultBehaviour {}

/// Behaviours by block name.
///
/// Built once at start-up and shared by `Arc`; blocks without an entry get a no-op
/// behaviour.
pub struct BlockBehaviours {
    behaviours: FxHashMap<Identifier, Arc<dyn BlockBehaviour>>,
    default: Arc<dyn BlockBehaviour>,
    any_random_ticks: bool,
}

impl BlockBehaviours {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            behaviours: FxHashMap::default(),
            default: Arc::new(DefaultBehaviour),
            any_random_ticks: false,
        }
    }

    /// Creates the table of built-in behaviours.
    #[must_use]
    pub fn vanilla() -> Self {
        let mut behaviours = Self::new();
        blocks::register_all(&mut behaviours);
        log::debug!("Registered {} block behaviours", behaviours.len());
        behaviours
    }

    /// Registers the behaviour of a block, replacing any previous one.
    pub fn register(&mut self, name: Identifier, behaviour: Arc<dyn BlockBehaviour>) {
        self.any_random_ticks |= behaviour.ticks_randomly();
        self.behaviours.insert(name, behaviour);
    }

    /// The behaviour of `state`'s block.
    #[must_use]
    pub fn get(&self, state: &BlockState) -> &dyn BlockBehaviour {
        self.behaviours
            .get(state.name())
            .unwrap_or(&self.default)
            .as_ref()
    }

    /// Returns true if any registered behaviour wants random ticks.
    #[must_use]
    pub fn any_random_ticks(&self) -> bool {
        self.any_random_ticks
    }

    /// The number of registered behaviours.
    #[must_use]
    pub fn len(&self) -> usize {
        self.behaviours.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.behaviours.is_empty()
    }
}

impl Default for BlockBehaviours {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_blocks_get_the_default_behaviour() {
        let behaviours = BlockBehaviours::vanilla();
        let stone = BlockState::new(Identifier::vanilla_static("stone"));
        assert!(behaviours.get(&stone).as_block_entity_provider().is_none());
        assert!(!behaviours.get(&stone).ticks_randomly());
    }

    #[test]
    fn capabilities_are_exposed() {
        let behaviours = BlockBehaviours::vanilla();
        let chest = BlockState::new(Identifier::vanilla_static("chest"));
        let water = BlockState::new(Identifier::vanilla_static("water"));

        assert_eq!(
            behaviours
                .get(&chest)
                .as_block_entity_provider()
                .map(BlockEntityProvider::block_entity_kind),
            Some(BlockEntityKind::Chest)
        );
        assert!(behaviours.get(&chest).as_liquid_displacer().is_some());
        let dispenser = BlockState::new(Identifier::vanilla_static("dispenser"));
        assert_eq!(
            behaviours
                .get(&dispenser)
                .as_block_entity_provider()
                .map(BlockEntityProvider::block_entity_kind),
            Some(BlockEntityKind::Dispenser)
        );
        assert!(behaviours.get(&dispenser).as_liquid_displacer().is_none());
        assert_eq!(behaviours.get(&water).as_liquid().map(Liquid::flow_delay), Some(5));
    }
}
