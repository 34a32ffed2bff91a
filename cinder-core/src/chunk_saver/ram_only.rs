//! RAM-only chunk storage.
//!
//! Records live in memory for the lifetime of the process. Useful for tests, minigames and
//! temporary worlds that don't need persistence.

use cinder_utils::{ChunkPos, locks::SyncRwLock};
use rustc_hash::FxHashMap;

use crate::error::StorageError;

use super::ChunkProvider;

/// In-memory chunk storage.
#[derive(Default)]
pub struct RamOnlyStorage {
    records: SyncRwLock<FxHashMap<(String, ChunkPos), Vec<u8>>>,
}

impl RamOnlyStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing has been saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl ChunkProvider for RamOnlyStorage {
    fn load(&self, dimension: &str, pos: ChunkPos) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .records
            .read()
            .get(&(dimension.to_string(), pos))
            .cloned())
    }

    fn save(&self, dimension: &str, pos: ChunkPos, data: &[u8]) -> Result<(), StorageError> {
        self.records
            .write()
            .insert((dimension.to_string(), pos), data.to_vec());
        Ok(())
    }
}
