//! World configuration, read from a JSON5 file.

use std::{
    fs,
    path::{Path, PathBuf},
};

use cinder_registry::BlockState;
use cinder_utils::Identifier;
use serde::Deserialize;

use crate::{
    chunk::{
        chunk_generator::ChunkGeneratorType, flat_chunk_generator::FlatChunkGenerator,
        void_chunk_generator::VoidChunkGenerator,
    },
    chunk_saver::{ChunkStorage, FileStorage, RamOnlyStorage},
    error::{ConfigError, WorldError},
    world::WorldSettings,
};

const DEFAULT_CONFIG: &str = include_str!("../../package-content/world.json5");

/// Where chunks are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageConfig {
    /// Kept in memory and lost on exit.
    Ram,
    /// Written under a directory.
    Disk {
        /// The directory.
        path: PathBuf,
    },
}

/// How chunks without a record are generated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorConfig {
    /// All air.
    Void,
    /// Horizontal layers from the bottom of the world up.
    Flat {
        /// Block names, lowest layer first.
        layers: Vec<Identifier>,
        /// Biome id for every column.
        #[serde(default)]
        biome: u32,
    },
}

/// Settings of one world.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Name chunks are stored under.
    pub dimension: String,
    /// Lowest block y.
    pub min_y: i32,
    /// Height in blocks.
    pub height: i32,
    /// Random positions picked per non-empty section each tick.
    pub random_tick_speed: u32,
    /// Most scheduled updates run in one tick.
    pub max_scheduled_updates_per_tick: usize,
    /// Chunk radius loaded around the origin before the first tick.
    pub preload_radius: i32,
    /// Seconds between automatic saves.
    pub autosave_interval_secs: u64,
    /// Chunk storage.
    pub storage: StorageConfig,
    /// Chunk generator.
    pub generator: GeneratorConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        let settings = WorldSettings::default();
        Self {
            dimension: settings.dimension,
            min_y: settings.min_y,
            height: settings.height,
            random_tick_speed: settings.random_tick_speed,
            max_scheduled_updates_per_tick: settings.max_scheduled_updates_per_tick,
            preload_radius: 4,
            autosave_interval_secs: 300,
            storage: StorageConfig::Ram,
            generator: GeneratorConfig::Void,
        }
    }
}

impl WorldConfig {
    /// Reads the config at `path`, writing the default file there first if it does not
    /// exist.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
            }
            fs::write(path, DEFAULT_CONFIG).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
            log::info!("Wrote default config to {}", path.display());
            return Self::parse(path, DEFAULT_CONFIG);
        }
        let text = fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::parse(path, &text)
    }

    fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = serde_json5::from_str(text)
            .map_err(|err| ConfigError::Parse(path.to_path_buf(), err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the world cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dimension.is_empty()
            || self.dimension.starts_with('.')
            || self
                .dimension
                .contains(|c: char| !Identifier::valid_path_char(c) || c == '/')
        {
            return Err(ConfigError::Invalid(
                "Dimension must be a non-empty name of a-z, 0-9, '_', '-' and '.'",
            ));
        }
        if self.height <= 0 || self.height % 16 != 0 || self.height > 4064 {
            return Err(ConfigError::Invalid("Height must be a multiple of 16 in range 16..4064"));
        }
        if self.min_y % 16 != 0 {
            return Err(ConfigError::Invalid("Min y must be a multiple of 16"));
        }
        if self.random_tick_speed > 4096 {
            return Err(ConfigError::Invalid("Random tick speed must be in range 0..4096"));
        }
        if self.max_scheduled_updates_per_tick == 0 {
            return Err(ConfigError::Invalid("Max scheduled updates per tick must be at least 1"));
        }
        if !(0..=32).contains(&self.preload_radius) {
            return Err(ConfigError::Invalid("Preload radius must be in range 0..32"));
        }
        if self.autosave_interval_secs == 0 {
            return Err(ConfigError::Invalid("Autosave interval must be at least 1 second"));
        }
        if let GeneratorConfig::Flat { layers, .. } = &self.generator
            && layers.len() > self.height as usize
        {
            return Err(ConfigError::Invalid("Flat layers must fit in the world height"));
        }
        Ok(())
    }

    /// The settings the world is built with.
    #[must_use]
    pub fn world_settings(&self) -> WorldSettings {
        WorldSettings {
            dimension: self.dimension.clone(),
            min_y: self.min_y,
            height: self.height,
            random_tick_speed: self.random_tick_speed,
            max_scheduled_updates_per_tick: self.max_scheduled_updates_per_tick,
        }
    }

    /// Opens the configured chunk storage.
    pub fn open_storage(&self) -> Result<ChunkStorage, WorldError> {
        match &self.storage {
            StorageConfig::Ram => Ok(ChunkStorage::RamOnly(RamOnlyStorage::new())),
            StorageConfig::Disk { path } => FileStorage::open(path)
                .map(ChunkStorage::File)
                .map_err(|err| WorldError::OpenStorage(path.clone(), err)),
        }
    }

    /// Builds the configured chunk generator.
    #[must_use]
    pub fn build_generator(&self) -> ChunkGeneratorType {
        match &self.generator {
            GeneratorConfig::Void => VoidChunkGenerator.into(),
            GeneratorConfig::Flat { layers, biome } => FlatChunkGenerator::new(
                layers.iter().cloned().map(BlockState::new).collect(),
                *biome,
            )
            .into(),
        }
    }
}
