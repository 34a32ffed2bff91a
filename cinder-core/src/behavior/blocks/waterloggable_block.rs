use cinder_registry::BlockState;

use crate::behavior::{BlockBehaviour, LiquidDisplacer};

/// Behavior for blocks that can hold water alongside themselves, such as stairs and fences.
pub struct WaterloggableBlock;

/// Returns true for water in either of its forms.
pub(super) fn is_water(liquid: &BlockState) -> bool {
    matches!(liquid.name().path.as_ref(), "water" | "flowing_water")
}

impl BlockBehaviour for WaterloggableBlock {
    fn as_liquid_displacer(&self) -> Option<&dyn LiquidDisplacer> {
        Some(self)
    }
}

impl LiquidDisplacer for WaterloggableBlock {
    fn can_displace(&self, liquid: &BlockState) -> bool {
        is_water(liquid)
    }
}
