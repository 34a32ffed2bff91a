//! Translation of pre-flattening block identifiers.
//!
//! Old saves identify a block by a name plus a numeric variant (`meta`). The table that
//! maps these to current block states ships with the binary as a stream of NBT compounds:
//!
//! ```text
//! { legacy: { name: String, meta: Short }, updated: { name: String, states: Compound } }
//! ```
//!
//! The table is read once during start-up and shared immutably afterwards.

use std::io::Cursor;

use rustc_hash::FxHashMap;
use simdnbt::owned::{Nbt, NbtCompound, NbtTag};

use crate::{RegistryError, block_state::BlockState};

const EMBEDDED_TABLE: &[u8] = include_bytes!("../assets/legacy_states.nbt");

/// Immutable lookup from `(legacy name, meta)` to a current block state.
#[derive(Debug, Default)]
pub struct LegacyBlockMapping {
    entries: FxHashMap<String, FxHashMap<i16, BlockState>>,
    len: usize,
}

impl LegacyBlockMapping {
    /// Loads the table bundled with the crate.
    pub fn embedded() -> Result<Self, RegistryError> {
        Self::load(EMBEDDED_TABLE)
    }

    /// Parses a table from a stream of concatenated NBT compounds.
    pub fn load(data: &[u8]) -> Result<Self, RegistryError> {
        let mut mapping = Self::default();
        let mut cursor = Cursor::new(data);
        let mut index = 0usize;

        while (cursor.position() as usize) < data.len() {
            let nbt = simdnbt::owned::read(&mut cursor)
                .map_err(|err| RegistryError::MalformedLegacyTable(index, err.to_string()))?;
            let Nbt::Some(entry) = nbt else {
                break;
            };

            let (name, meta, state) = Self::parse_entry(&entry)
                .ok_or_else(|| RegistryError::MalformedLegacyTable(index, "bad entry".into()))?;
            mapping.insert(name, meta, state);
            index += 1;
        }

        log::debug!("Loaded {} legacy block mappings", mapping.len);
        Ok(mapping)
    }

    fn parse_entry(entry: &NbtCompound) -> Option<(String, i16, BlockState)> {
        let Some(NbtTag::Compound(legacy)) = entry.get("legacy") else {
            return None;
        };
        let Some(NbtTag::Compound(updated)) = entry.get("updated") else {
            return None;
        };

        let name = match legacy.get("name")? {
            NbtTag::String(name) => name.to_str().into_owned(),
            _ => return None,
        };
        let meta = match legacy.get("meta") {
            Some(NbtTag::Short(meta)) => *meta,
            Some(NbtTag::Int(meta)) => i16::try_from(*meta).ok()?,
            _ => 0,
        };

        Some((name, meta, BlockState::from_nbt(updated)?))
    }

    /// Builds a table from in-memory entries.
    pub fn from_entries(entries: impl IntoIterator<Item = ((String, i16), BlockState)>) -> Self {
        let mut mapping = Self::default();
        for ((name, meta), state) in entries {
            mapping.insert(name, meta, state);
        }
        mapping
    }

    fn insert(&mut self, name: String, meta: i16, state: BlockState) {
        if self.entries.entry(name).or_default().insert(meta, state).is_none() {
            self.len += 1;
        }
    }

    /// Upgrades a legacy block.
    ///
    /// The exact `(name, meta)` pair is tried first, then `(name, 0)` for blocks whose
    /// variant does not change the resulting state.
    #[must_use]
    pub fn upgrade(&self, name: &str, meta: i16) -> Option<&BlockState> {
        let variants = self.entries.get(name)?;
        variants.get(&meta).or_else(|| variants.get(&0))
    }

    /// Upgrades a legacy block, substituting [`BlockState::unknown`] when the table has no
    /// entry so that a single unsupported block never fails a whole chunk.
    #[must_use]
    pub fn upgrade_or_unknown(&self, name: &str, meta: i16) -> BlockState {
        if let Some(state) = self.upgrade(name, meta) {
            state.clone()
        } else {
            log::warn!("No legacy mapping for {name}:{meta}, using placeholder");
            BlockState::unknown()
        }
    }

    /// The number of `(name, meta)` entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
