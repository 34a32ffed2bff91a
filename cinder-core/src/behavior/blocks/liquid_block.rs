//! Liquid block behavior (water, lava).

use cinder_registry::BlockState;
use cinder_utils::{BlockPos, Direction};

use crate::{
    behavior::{BlockBehaviour, Liquid},
    world::{SetBlockOptions, World},
};

/// Behavior for liquid blocks (water, lava).
///
/// When a neighbour changes the liquid schedules an update of itself. When that update runs
/// the liquid falls into the block below it if that block is air.
pub struct LiquidBlock {
    flow_delay: u64,
}

impl LiquidBlock {
    /// Creates a liquid reacting `flow_delay` ticks after a neighbour changes.
    #[must_use]
    pub const fn new(flow_delay: u64) -> Self {
        Self { flow_delay }
    }
}

impl BlockBehaviour for LiquidBlock {
    fn neighbour_update(&self, world: &World, pos: BlockPos, _state: &BlockState, _changed: BlockPos) {
        world.schedule_update(pos, self.flow_delay);
    }

    fn scheduled_update(&self, world: &World, pos: BlockPos, state: &BlockState) {
        let below = pos.relative(Direction::Down);
        if world.is_loaded(below) && world.block(below).is_air() {
            world.set_block(below, state.clone(), SetBlockOptions::default());
        }
    }

    fn as_liquid(&self) -> Option<&dyn Liquid> {
        Some(self)
    }
}

impl Liquid for LiquidBlock {
    fn flow_delay(&self) -> u64 {
        self.flow_delay
    }
}
