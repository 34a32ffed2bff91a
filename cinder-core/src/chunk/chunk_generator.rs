//! This module contains the `ChunkGenerator` trait, which fills chunks the storage does not have.

use enum_dispatch::enum_dispatch;

use crate::chunk::{
    flat_chunk_generator::FlatChunkGenerator, level_chunk::LevelChunk,
    void_chunk_generator::VoidChunkGenerator,
};

/// A trait for generating chunks.
#[enum_dispatch]
pub trait ChunkGenerator: Send + Sync {
    /// Fills a freshly created, all-air chunk.
    fn generate(&self, chunk: &mut LevelChunk);
}

#[allow(missing_docs)]
#[enum_dispatch(ChunkGenerator)]
pub enum ChunkGeneratorType {
    Void(VoidChunkGenerator),
    Flat(FlatChunkGenerator),
}
