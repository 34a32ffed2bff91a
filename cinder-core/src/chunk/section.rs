//! This module contains the `ChunkSection` struct, one 16x16x16 slice of a chunk column.

use cinder_registry::BlockState;

use crate::chunk::paletted_container::{BiomePalette, BlockPalette};

/// The edge length of a section.
pub const SECTION_SIZE: usize = 16;

/// Returns the storage index of a block inside a section.
///
/// Indices are laid out x-major, then z, then y.
#[must_use]
pub const fn block_index(x: usize, y: usize, z: usize) -> usize {
    debug_assert!(x < SECTION_SIZE && y < SECTION_SIZE && z < SECTION_SIZE);
    (x * SECTION_SIZE + z) * SECTION_SIZE + y
}

/// Returns the storage index of a biome column inside a section.
#[must_use]
pub const fn column_index(x: usize, z: usize) -> usize {
    x * SECTION_SIZE + z
}

/// A chunk section.
#[derive(Debug, Clone)]
pub struct ChunkSection {
    /// The block states in the section.
    pub states: BlockPalette,
    /// Liquids sharing a position with another block, allocated on first use.
    pub liquids: Option<BlockPalette>,
    /// The biomes in the section, one per column.
    pub biomes: BiomePalette,
}

impl ChunkSection {
    /// Creates a new chunk section.
    #[must_use]
    pub fn new(states: BlockPalette) -> Self {
        Self {
            states,
            liquids: None,
            biomes: BiomePalette::Homogeneous(0),
        }
    }

    /// Creates a new empty chunk section.
    #[must_use]
    pub fn new_empty() -> Self {
        Self::new(BlockPalette::Homogeneous(BlockState::air()))
    }

    /// Gets the block at a position relative to the section.
    #[must_use]
    pub fn block(&self, x: usize, y: usize, z: usize) -> &BlockState {
        self.states.get(block_index(x, y, z))
    }

    /// Sets the block at a position relative to the section, returning the previous block.
    pub fn set_block(&mut self, x: usize, y: usize, z: usize, state: BlockState) -> BlockState {
        self.states.set(block_index(x, y, z), state)
    }

    /// Gets the liquid sharing the position, if any.
    #[must_use]
    pub fn liquid(&self, x: usize, y: usize, z: usize) -> Option<&BlockState> {
        let liquid = self.liquids.as_ref()?.get(block_index(x, y, z));
        (!liquid.is_air()).then_some(liquid)
    }

    /// Sets or clears the liquid at a position.
    pub fn set_liquid(&mut self, x: usize, y: usize, z: usize, liquid: Option<BlockState>) {
        match liquid {
            Some(liquid) => {
                self.liquids
                    .get_or_insert_with(BlockPalette::default)
                    .set(block_index(x, y, z), liquid);
            }
            None => {
                if let Some(liquids) = &mut self.liquids {
                    liquids.set(block_index(x, y, z), BlockState::air());
                }
            }
        }
    }

    /// Gets the biome of a column.
    #[must_use]
    pub fn biome(&self, x: usize, z: usize) -> u32 {
        *self.biomes.get(column_index(x, z))
    }

    /// Sets the biome of a column.
    pub fn set_biome(&mut self, x: usize, z: usize, biome: u32) {
        self.biomes.set(column_index(x, z), biome);
    }

    /// Returns true if the section holds only air and no liquids.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let air = BlockState::air();
        self.states.is_all(&air) && self.liquids.as_ref().is_none_or(|l| l.is_all(&air))
    }

    /// Compacts all palettes and drops the liquid layer if it holds nothing.
    pub fn compact(&mut self) {
        self.states.compact();
        self.biomes.compact();
        if let Some(liquids) = &mut self.liquids {
            liquids.compact();
            if liquids
                .homogeneous_value()
                .is_some_and(BlockState::is_air)
            {
                self.liquids = None;
            }
        }
    }
}
