//! Chunk storage abstraction.
//!
//! This module provides the `ChunkStorage` enum which abstracts chunk persistence.
//! Variants can store chunks on disk (via `FileStorage`), in memory (via `RamOnlyStorage`)
//! or in any backend implementing `ChunkProvider`.

use cinder_utils::ChunkPos;

use crate::error::StorageError;

use super::{file_storage::FileStorage, ram_only::RamOnlyStorage};

/// An opaque key/value store of chunk records.
pub trait ChunkProvider: Send + Sync {
    /// Loads the record of a chunk, or `None` if it was never saved.
    fn load(&self, dimension: &str, pos: ChunkPos) -> Result<Option<Vec<u8>>, StorageError>;

    /// Saves the record of a chunk, replacing any previous one.
    fn save(&self, dimension: &str, pos: ChunkPos, data: &[u8]) -> Result<(), StorageError>;
}

/// Chunk storage backend.
pub enum ChunkStorage {
    /// In-memory storage for testing and minigames.
    RamOnly(RamOnlyStorage),
    /// Disk-based storage, one compressed file per chunk.
    File(FileStorage),
    /// A backend supplied by the embedder.
    Custom(Box<dyn ChunkProvider>),
}

impl ChunkStorage {
    /// Loads a chunk record.
    ///
    /// Returns `Ok(None)` if the chunk doesn't exist in storage.
    pub fn load(&self, dimension: &str, pos: ChunkPos) -> Result<Option<Vec<u8>>, StorageError> {
        match self {
            Self::RamOnly(ram) => ram.load(dimension, pos),
            Self::File(file) => file.load(dimension, pos),
            Self::Custom(provider) => provider.load(dimension, pos),
        }
    }

    /// Saves a chunk record.
    pub fn save(&self, dimension: &str, pos: ChunkPos, data: &[u8]) -> Result<(), StorageError> {
        match self {
            Self::RamOnly(ram) => ram.save(dimension, pos, data),
            Self::File(file) => file.save(dimension, pos, data),
            Self::Custom(provider) => provider.save(dimension, pos, data),
        }
    }

    /// A short name of the backend for log messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::RamOnly(_) => "ram",
            Self::File(_) => "disk",
            Self::Custom(_) => "custom",
        }
    }
}
