use crate::chunk::{chunk_generator::ChunkGenerator, level_chunk::LevelChunk};

/// A chunk generator that leaves every chunk empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoidChunkGenerator;

impl ChunkGenerator for VoidChunkGenerator {
    fn generate(&self, _chunk: &mut LevelChunk) {}
}
