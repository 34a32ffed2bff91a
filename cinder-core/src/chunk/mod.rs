//! Chunk storage: paletted sections, whole columns, their record codec and generators.

pub mod chunk_generator;
pub mod codec;
pub mod flat_chunk_generator;
pub mod level_chunk;
pub mod paletted_container;
pub mod section;
pub mod void_chunk_generator;
