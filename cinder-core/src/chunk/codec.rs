//! Chunk records: the NBT layout chunks are persisted in.
//!
//! ```text
//! {
//!   Version: Int, xPos: Int, zPos: Int,
//!   Sections: [{
//!     Y: Byte,
//!     Palette: [{name, states}], Bits: Byte, Indices: IntArray,
//!     Biomes: {Palette: IntArray, Bits: Byte, Indices: IntArray},
//!     Liquids: {Palette: [{name, states}], Bits: Byte, Indices: IntArray},
//!   }],
//!   BlockEntities: [{id, x, y, z, ...}],
//!   ScheduledUpdates: [{x, y, z, Delay: Int, State: {name, states}}],
//! }
//! ```
//!
//! `Indices` is omitted for single-entry palettes. Older records may carry a
//! `LegacyPalette` of `{name, val}` entries instead of `Palette`; those are upgraded through
//! the [`LegacyBlockMapping`] while decoding.
//!
//! Decoding never fails because of one bad section, entity or update: the offending part is
//! logged and replaced by its default. Only bytes that are not an NBT compound at all are an
//! error.

use std::{io::Cursor, sync::Arc};

use cinder_registry::{BlockState, LegacyBlockMapping};
use cinder_utils::{BlockPos, ChunkPos};
use simdnbt::owned::{BaseNbt, Nbt, NbtCompound, NbtList, NbtTag};

use crate::{
    block_entity::{self, nbt},
    chunk::{
        level_chunk::LevelChunk,
        paletted_container::{BiomePalette, BlockPalette, PaletteValue, PalettedContainer},
        section::ChunkSection,
    },
    error::StorageError,
    ticks::ScheduledUpdate,
    viewer::ViewerRegistry,
};

/// The record version written by this codec.
pub const CHUNK_VERSION: i32 = 1;

/// Collaborators needed to rebuild a chunk.
pub struct DecodeContext<'a> {
    /// Table used to upgrade legacy palettes.
    pub legacy: &'a LegacyBlockMapping,
    /// Registry new block entity inventories report to.
    pub viewers: &'a Arc<ViewerRegistry>,
}

/// A scheduled update read back from a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedUpdate {
    /// The position to update.
    pub pos: BlockPos,
    /// Ticks left when the chunk was saved.
    pub delay: u64,
    /// The block state captured at scheduling time.
    pub state: BlockState,
}

/// A chunk together with the updates that were pending in it.
#[derive(Debug)]
pub struct DecodedChunk {
    /// The chunk.
    pub chunk: LevelChunk,
    /// Its pending scheduled updates.
    pub updates: Vec<PersistedUpdate>,
}

/// Encodes a chunk and its pending updates.
///
/// Palettes are compacted first so entries no longer referenced are not persisted.
#[must_use]
pub fn encode_chunk(chunk: &mut LevelChunk, updates: &[ScheduledUpdate], current_tick: u64) -> Vec<u8> {
    chunk.compact();

    let mut root = NbtCompound::new();
    root.insert("Version", NbtTag::Int(CHUNK_VERSION));
    root.insert("xPos", NbtTag::Int(chunk.pos.x()));
    root.insert("zPos", NbtTag::Int(chunk.pos.z()));

    let min_section = chunk.min_y() >> 4;
    let sections = chunk
        .sections()
        .iter()
        .enumerate()
        .filter(|(_, section)| !section.is_empty() || section.biomes.homogeneous_value() != Some(&0))
        .map(|(i, section)| encode_section(min_section + i as i32, section))
        .collect();
    root.insert("Sections", NbtTag::List(NbtList::Compound(sections)));

    let entities = chunk
        .block_entities()
        .map(block_entity::save_block_entity)
        .collect();
    root.insert("BlockEntities", NbtTag::List(NbtList::Compound(entities)));

    let updates = updates
        .iter()
        .map(|update| {
            let mut nbt = NbtCompound::new();
            nbt.insert("x", NbtTag::Int(update.pos.x()));
            nbt.insert("y", NbtTag::Int(update.pos.y()));
            nbt.insert("z", NbtTag::Int(update.pos.z()));
            let delay = i32::try_from(update.remaining(current_tick)).unwrap_or(i32::MAX);
            nbt.insert("Delay", NbtTag::Int(delay));
            nbt.insert("State", NbtTag::Compound(update.state.to_nbt()));
            nbt
        })
        .collect();
    root.insert("ScheduledUpdates", NbtTag::List(NbtList::Compound(updates)));

    let mut data = Vec::new();
    BaseNbt::new("", root).write(&mut data);
    data
}

fn encode_section(y: i32, section: &ChunkSection) -> NbtCompound {
    let mut nbt = NbtCompound::new();
    nbt.insert("Y", NbtTag::Byte(y as i8));
    write_block_palette(&mut nbt, &section.states);

    let mut biomes = NbtCompound::new();
    biomes.insert(
        "Palette",
        NbtTag::IntArray(section.biomes.palette().iter().map(|id| *id as i32).collect()),
    );
    write_indices(&mut biomes, &section.biomes);
    nbt.insert("Biomes", NbtTag::Compound(biomes));

    if let Some(liquids) = &section.liquids {
        let mut layer = NbtCompound::new();
        write_block_palette(&mut layer, liquids);
        nbt.insert("Liquids", NbtTag::Compound(layer));
    }
    nbt
}

fn write_block_palette(nbt: &mut NbtCompound, palette: &BlockPalette) {
    let entries = palette.palette().iter().map(BlockState::to_nbt).collect();
    nbt.insert("Palette", NbtTag::List(NbtList::Compound(entries)));
    write_indices(nbt, palette);
}

fn write_indices<V: PaletteValue, const LEN: usize>(
    nbt: &mut NbtCompound,
    palette: &PalettedContainer<V, LEN>,
) {
    nbt.insert("Bits", NbtTag::Byte(palette.bits_per_index() as i8));
    if palette.bits_per_index() > 0 {
        nbt.insert(
            "Indices",
            NbtTag::IntArray(palette.words().iter().map(|word| *word as i32).collect()),
        );
    }
}

/// Decodes a chunk record.
///
/// `min_y` and `height` describe the dimension; sections outside it are dropped.
pub fn decode_chunk(
    pos: ChunkPos,
    min_y: i32,
    height: i32,
    data: &[u8],
    ctx: &DecodeContext<'_>,
) -> Result<DecodedChunk, StorageError> {
    let nbt = simdnbt::owned::read(&mut Cursor::new(data))
        .map_err(|err| StorageError::Malformed(err.to_string()))?;
    let Nbt::Some(root) = nbt else {
        return Err(StorageError::Malformed("empty record".to_string()));
    };
    let root: &NbtCompound = &root;

    match nbt::read_i32(root, "Version") {
        Some(version) if version > CHUNK_VERSION => {
            log::warn!("Chunk {pos} was written by a newer version ({version}), reading anyway");
        }
        None => log::debug!("Chunk {pos} has no version, assuming {CHUNK_VERSION}"),
        _ => {}
    }
    if let (Some(x), Some(z)) = (nbt::read_i32(root, "xPos"), nbt::read_i32(root, "zPos"))
        && (x, z) != (pos.x(), pos.z())
    {
        log::warn!("Chunk {pos} is stored with position [{x}, {z}]");
    }

    let mut chunk = LevelChunk::new(pos, min_y, height);
    let min_section = min_y >> 4;

    for section in compounds(root, "Sections") {
        let Some(y) = nbt::read_i32(section, "Y") else {
            log::warn!("Skipping section without Y in chunk {pos}");
            continue;
        };
        let Some(index) = usize::try_from(y - min_section)
            .ok()
            .filter(|index| *index < chunk.sections().len())
        else {
            log::warn!("Skipping section {y} outside the dimension in chunk {pos}");
            continue;
        };
        chunk.sections_mut()[index] = decode_section(pos, y, section, ctx.legacy);
    }

    for record in compounds(root, "BlockEntities") {
        let Some(entity) = block_entity::load_block_entity(record, ctx.viewers) else {
            continue;
        };
        let entity_pos = entity.get_block_pos();
        if entity_pos.chunk_pos() != pos {
            log::warn!("Skipping block entity at {entity_pos} stored in chunk {pos}");
            continue;
        }
        if chunk.block(entity_pos).is_air() {
            log::warn!("Skipping block entity at {entity_pos} without a block");
            continue;
        }
        chunk.insert_block_entity(entity);
    }

    let updates = compounds(root, "ScheduledUpdates")
        .filter_map(|record| decode_update(pos, record))
        .collect();

    chunk.take_inventory_changes();
    chunk.clear_dirty();
    Ok(DecodedChunk { chunk, updates })
}

fn compounds<'a>(nbt: &'a NbtCompound, key: &str) -> impl Iterator<Item = &'a NbtCompound> {
    let list = match nbt.get(key) {
        Some(NbtTag::List(NbtList::Compound(list))) => list.as_slice(),
        _ => &[],
    };
    list.iter()
}

fn decode_section(
    pos: ChunkPos,
    y: i32,
    nbt: &NbtCompound,
    legacy: &LegacyBlockMapping,
) -> ChunkSection {
    let states = if let Some(palette) = read_palette(nbt) {
        read_indices(nbt, palette)
    } else if let Some(palette) = read_legacy_palette(nbt, legacy) {
        read_indices(nbt, palette)
    } else {
        None
    };
    let states = states.unwrap_or_else(|| {
        log::warn!("Section {y} of chunk {pos} has unreadable blocks, using air");
        BlockPalette::default()
    });

    let mut section = ChunkSection::new(states);

    if let Some(NbtTag::Compound(biomes)) = nbt.get("Biomes") {
        let palette = match biomes.get("Palette") {
            Some(NbtTag::IntArray(ids)) => Some(ids.iter().map(|id| *id as u32).collect()),
            _ => None,
        };
        let decoded: Option<BiomePalette> =
            palette.and_then(|palette| read_indices(biomes, palette));
        match decoded {
            Some(biomes) => section.biomes = biomes,
            None => log::warn!("Section {y} of chunk {pos} has unreadable biomes"),
        }
    }

    if let Some(NbtTag::Compound(liquids)) = nbt.get("Liquids") {
        match read_palette(liquids).and_then(|palette| read_indices(liquids, palette)) {
            Some(liquids) => section.liquids = Some(liquids),
            None => log::warn!("Section {y} of chunk {pos} has an unreadable liquid layer"),
        }
    }
    section
}

fn read_palette(nbt: &NbtCompound) -> Option<Vec<BlockState>> {
    let Some(NbtTag::List(list)) = nbt.get("Palette") else {
        return None;
    };
    let entries = match list {
        NbtList::Compound(entries) => entries,
        NbtList::Empty => return Some(Vec::new()),
        _ => return None,
    };
    Some(
        entries
            .iter()
            .map(|entry| BlockState::from_nbt(entry).unwrap_or_else(BlockState::unknown))
            .collect(),
    )
}

fn read_legacy_palette(nbt: &NbtCompound, legacy: &LegacyBlockMapping) -> Option<Vec<BlockState>> {
    let Some(NbtTag::List(NbtList::Compound(entries))) = nbt.get("LegacyPalette") else {
        return None;
    };
    Some(
        entries
            .iter()
            .map(|entry| match nbt::read_string(entry, "name") {
                Some(name) => {
                    let meta = nbt::read_i16(entry, "val").unwrap_or(0);
                    legacy.upgrade_or_unknown(&name, meta)
                }
                None => BlockState::unknown(),
            })
            .collect(),
    )
}

fn read_indices<V: PaletteValue, const LEN: usize>(
    nbt: &NbtCompound,
    palette: Vec<V>,
) -> Option<PalettedContainer<V, LEN>> {
    let bits = nbt::read_int(nbt, "Bits").unwrap_or(0);
    let words = match nbt.get("Indices") {
        Some(NbtTag::IntArray(words)) => words.iter().map(|word| *word as u32).collect(),
        _ => Vec::new(),
    };
    PalettedContainer::from_packed(palette, u8::try_from(bits).ok()?, words)
}

fn decode_update(pos: ChunkPos, nbt: &NbtCompound) -> Option<PersistedUpdate> {
    let (Some(x), Some(y), Some(z)) = (
        nbt::read_i32(nbt, "x"),
        nbt::read_i32(nbt, "y"),
        nbt::read_i32(nbt, "z"),
    ) else {
        log::warn!("Skipping scheduled update without a position in chunk {pos}");
        return None;
    };
    let update_pos = BlockPos::new(x, y, z);
    if update_pos.chunk_pos() != pos {
        log::warn!("Skipping scheduled update at {update_pos} stored in chunk {pos}");
        return None;
    }
    let Some(NbtTag::Compound(state)) = nbt.get("State") else {
        log::warn!("Skipping scheduled update at {update_pos} without a state");
        return None;
    };
    Some(PersistedUpdate {
        pos: update_pos,
        delay: nbt::read_int(nbt, "Delay").unwrap_or(0).max(0) as u64,
        state: BlockState::from_nbt(state)?,
    })
}

#[cfg(test)]
mod tests {
    use cinder_utils::{Facing, Identifier};

    use super::*;
    use crate::block_entity::entities::{ChestBlockEntity, NoteBlockEntity};

    const MIN_Y: i32 = -64;
    const HEIGHT: i32 = 384;

    struct Fixture {
        legacy: LegacyBlockMapping,
        viewers: Arc<ViewerRegistry>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                legacy: LegacyBlockMapping::embedded().expect("embedded table should parse"),
                viewers: Arc::new(ViewerRegistry::new()),
            }
        }

        fn ctx(&self) -> DecodeContext<'_> {
            DecodeContext {
                legacy: &self.legacy,
                viewers: &self.viewers,
            }
        }
    }

    fn state(name: &'static str) -> BlockState {
        BlockState::new(Identifier::vanilla_static(name))
    }

    #[test]
    fn blocks_biomes_and_liquids_survive_a_round_trip() {
        let fixture = Fixture::new();
        let pos = ChunkPos::new(3, -2);
        let mut chunk = LevelChunk::new(pos, MIN_Y, HEIGHT);
        let names = ["stone", "dirt", "granite", "oak_planks", "sand", "gravel"];
        for (i, name) in names.iter().enumerate() {
            for y in 0..8 {
                chunk.set_block(BlockPos::new(48 + i as i32, MIN_Y + y * 3, -32 + y), state(name));
            }
        }
        let waterlogged = BlockPos::new(50, 70, -20);
        chunk.set_block(waterlogged, state("oak_stairs"));
        chunk.set_liquid(waterlogged, Some(state("water")));
        chunk.set_biome(BlockPos::new(49, 0, -31), 7);

        let data = encode_chunk(&mut chunk, &[], 0);
        let decoded = decode_chunk(pos, MIN_Y, HEIGHT, &data, &fixture.ctx()).unwrap();

        for (a, b) in chunk.sections().iter().zip(decoded.chunk.sections()) {
            assert!(a.states.iter().eq(b.states.iter()));
            assert!(a.biomes.iter().eq(b.biomes.iter()));
        }
        assert_eq!(decoded.chunk.liquid(waterlogged), Some(state("water")));
        assert_eq!(decoded.chunk.biome(BlockPos::new(49, 0, -31)), Some(7));
        assert!(!decoded.chunk.is_dirty());
    }

    #[test]
    fn stale_palette_entries_are_not_persisted() {
        let fixture = Fixture::new();
        let pos = ChunkPos::new(0, 0);
        let mut chunk = LevelChunk::new(pos, 0, 256);
        let at = BlockPos::new(1, 1, 1);
        chunk.set_block(at, state("stone"));
        chunk.set_block(at, state("dirt"));

        let data = encode_chunk(&mut chunk, &[], 0);
        let decoded = decode_chunk(pos, 0, 256, &data, &fixture.ctx()).unwrap();
        assert_eq!(decoded.chunk.sections()[0].states.palette().len(), 2);
        assert_eq!(decoded.chunk.block(at), state("dirt"));
    }

    #[test]
    fn legacy_palettes_are_upgraded() {
        let fixture = Fixture::new();
        let pos = ChunkPos::new(0, 0);
        let legacy_entry = |name: &str, val: i16| {
            let mut entry = NbtCompound::new();
            entry.insert("name", NbtTag::String(name.to_string().into()));
            entry.insert("val", NbtTag::Short(val));
            entry
        };
        let palette = vec![
            legacy_entry("minecraft:air", 0),
            legacy_entry("minecraft:stone", 1),
            legacy_entry("minecraft:reactor_core", 0),
            legacy_entry("minecraft:chest", 5),
        ];
        let mut words = vec![0u32; 256];
        // Two bits per index: block 0 is granite, block 1 unknown, block 2 a chest.
        words[0] = 1 | (2 << 2) | (3 << 4);

        let mut section = NbtCompound::new();
        section.insert("Y", NbtTag::Byte(0));
        section.insert("LegacyPalette", NbtTag::List(NbtList::Compound(palette)));
        section.insert("Bits", NbtTag::Byte(2));
        section.insert("Indices", NbtTag::IntArray(words.iter().map(|w| *w as i32).collect()));
        let mut root = NbtCompound::new();
        root.insert("Sections", NbtTag::List(NbtList::Compound(vec![section])));
        let mut data = Vec::new();
        BaseNbt::new("", root).write(&mut data);

        let decoded = decode_chunk(pos, 0, 256, &data, &fixture.ctx()).unwrap();
        let chunk = decoded.chunk;
        assert_eq!(chunk.block(BlockPos::new(0, 0, 0)), state("granite"));
        assert!(chunk.block(BlockPos::new(0, 1, 0)).is_unknown());
        assert_eq!(chunk.block(BlockPos::new(0, 2, 0)).facing(), Some(Facing::East));
        assert!(chunk.block(BlockPos::new(0, 3, 0)).is_air());
    }

    #[test]
    fn malformed_sections_become_air_without_failing_the_chunk() {
        let fixture = Fixture::new();
        let pos = ChunkPos::new(0, 0);
        let mut bad = NbtCompound::new();
        bad.insert("Y", NbtTag::Byte(1));
        bad.insert(
            "Palette",
            NbtTag::List(NbtList::Compound(vec![state("stone").to_nbt(), state("dirt").to_nbt()])),
        );
        bad.insert("Bits", NbtTag::Byte(1));
        bad.insert("Indices", NbtTag::IntArray(vec![0; 3]));
        let mut root = NbtCompound::new();
        root.insert("Sections", NbtTag::List(NbtList::Compound(vec![bad])));
        let mut data = Vec::new();
        BaseNbt::new("", root).write(&mut data);

        let decoded = decode_chunk(pos, 0, 256, &data, &fixture.ctx()).unwrap();
        assert!(decoded.chunk.sections()[1].is_empty());
    }

    #[test]
    fn garbage_is_an_error() {
        let fixture = Fixture::new();
        assert!(matches!(
            decode_chunk(ChunkPos::new(0, 0), 0, 256, &[0xFF, 0x00, 0x13], &fixture.ctx()),
            Err(StorageError::Malformed(_))
        ));
    }

    #[test]
    fn block_entities_and_updates_round_trip() {
        let fixture = Fixture::new();
        let pos = ChunkPos::new(0, 0);
        let mut chunk = LevelChunk::new(pos, 0, 256);
        let chest_pos = BlockPos::new(2, 64, 2);
        let note_pos = BlockPos::new(3, 64, 2);
        let orphan_pos = BlockPos::new(4, 64, 2);
        chunk.set_block(chest_pos, state("chest"));
        chunk.set_block(note_pos, state("noteblock"));
        chunk.insert_block_entity(Box::new(ChestBlockEntity::new(chest_pos, &fixture.viewers)));
        chunk.insert_block_entity(Box::new(NoteBlockEntity::with_pitch(note_pos, 12)));
        chunk.insert_block_entity(Box::new(NoteBlockEntity::new(orphan_pos)));

        let update = ScheduledUpdate::new(note_pos, 130, state("noteblock"), 0);
        let data = encode_chunk(&mut chunk, &[update], 100);
        let decoded = decode_chunk(pos, 0, 256, &data, &fixture.ctx()).unwrap();

        assert!(decoded.chunk.block_entity_as::<ChestBlockEntity>(chest_pos).is_some());
        assert_eq!(
            decoded
                .chunk
                .block_entity_as::<NoteBlockEntity>(note_pos)
                .map(NoteBlockEntity::pitch),
            Some(12)
        );
        assert!(decoded.chunk.block_entity(orphan_pos).is_none());
        assert_eq!(
            decoded.updates,
            vec![PersistedUpdate {
                pos: note_pos,
                delay: 30,
                state: state("noteblock"),
            }]
        );
    }
}
