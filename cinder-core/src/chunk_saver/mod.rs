//! Chunk persistence.
//!
//! Chunks are stored as opaque byte records keyed by dimension and position. The records
//! themselves are produced by [`crate::chunk::codec`]; backends only move bytes.

mod file_storage;
mod ram_only;
mod storage;

pub use file_storage::FileStorage;
pub use ram_only::RamOnlyStorage;
pub use storage::{ChunkProvider, ChunkStorage};
