use cinder_registry::BlockState;
use cinder_utils::BlockPos;

use crate::chunk::{chunk_generator::ChunkGenerator, level_chunk::LevelChunk};

/// A chunk generator that generates a flat world.
#[derive(Debug, Clone)]
pub struct FlatChunkGenerator {
    /// The layers from the bottom of the world up, one block each.
    pub layers: Vec<BlockState>,
    /// The biome id of every column.
    pub biome: u32,
}

impl FlatChunkGenerator {
    /// Creates a new `FlatChunkGenerator`.
    #[must_use]
    pub fn new(layers: Vec<BlockState>, biome: u32) -> Self {
        Self { layers, biome }
    }
}

impl ChunkGenerator for FlatChunkGenerator {
    fn generate(&self, chunk: &mut LevelChunk) {
        let min_x = chunk.pos.min_block_x();
        let min_z = chunk.pos.min_block_z();
        let min_y = chunk.min_y();
        let layers = self.layers.iter().take(chunk.height().max(0) as usize);

        for (dy, layer) in layers.enumerate() {
            if layer.is_air() {
                continue;
            }
            for x in 0..16 {
                for z in 0..16 {
                    chunk.set_block(BlockPos::new(min_x + x, min_y + dy as i32, min_z + z), layer.clone());
                }
            }
        }

        if self.biome != 0 {
            for section_y in (0..chunk.height()).step_by(16) {
                for x in 0..16 {
                    for z in 0..16 {
                        chunk.set_biome(BlockPos::new(min_x + x, min_y + section_y, min_z + z), self.biome);
                    }
                }
            }
        }
    }
}
