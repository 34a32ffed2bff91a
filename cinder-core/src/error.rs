//! Error types of the world engine.

use std::{io, path::PathBuf};

use cinder_registry::RegistryError;
use cinder_utils::ChunkPos;

/// Errors raised by inventory operations.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// The slot index is past the end of the inventory.
    #[error("slot {slot} is out of range for an inventory of {size} slots")]
    SlotOutOfRange {
        /// The requested slot.
        slot: usize,
        /// The inventory size.
        size: usize,
    },
}

/// Errors raised by chunk storage backends and the chunk record codec.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend failed to read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A stored record could not be decoded at all.
    #[error("malformed chunk record: {0}")]
    Malformed(String),
    /// A custom backend reported a failure.
    #[error("{0}")]
    Backend(String),
}

/// Errors surfaced by world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A chunk could not be loaded.
    #[error("failed to load chunk {0}: {1}")]
    Load(ChunkPos, #[source] StorageError),
    /// A chunk could not be saved.
    #[error("failed to save chunk {0}: {1}")]
    Save(ChunkPos, #[source] StorageError),
    /// The storage backend could not be opened.
    #[error("failed to open chunk storage at {0}: {1}")]
    OpenStorage(PathBuf, #[source] io::Error),
    /// A registry table failed to load.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Errors raised while loading the world configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read or created.
    #[error("failed to access config file {0}: {1}")]
    Io(PathBuf, #[source] io::Error),
    /// The file is not valid JSON5 for the config schema.
    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, String),
    /// A value is outside its allowed range.
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}
