//! Block entity implementations.

mod chest;
mod dispenser;
mod hopper;
mod note;
mod smelter;

pub use chest::{ChestBlockEntity, ChestPairing};
pub use dispenser::{DISPENSER_SIZE, DispenserBlockEntity};
pub use hopper::HopperBlockEntity;
pub use note::{MAX_PITCH, NoteBlockEntity};
pub use smelter::{SmelterBlockEntity, SmeltingProgress};
