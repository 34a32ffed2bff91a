//! This module contains the `LevelChunk` struct, a loaded chunk column.

use cinder_registry::BlockState;
use cinder_utils::{BlockPos, ChunkPos};
use rustc_hash::FxHashMap;

use crate::{
    block_entity::BlockEntity,
    chunk::section::{ChunkSection, SECTION_SIZE},
    inventory::ContainerId,
};

/// A loaded chunk column: sections from `min_y` upwards plus the block entities inside it.
pub struct LevelChunk {
    /// The position of the chunk.
    pub pos: ChunkPos,
    min_y: i32,
    sections: Box<[ChunkSection]>,
    block_entities: FxHashMap<BlockPos, Box<dyn BlockEntity>>,
    /// The inventory revisions seen by the last save.
    saved_inventories: FxHashMap<BlockPos, (ContainerId, u64)>,
    dirty: bool,
    retired: bool,
}

impl LevelChunk {
    /// Creates an all-air chunk spanning `height` blocks from `min_y`.
    #[must_use]
    pub fn new(pos: ChunkPos, min_y: i32, height: i32) -> Self {
        let section_count = (height / SECTION_SIZE as i32).max(0) as usize;
        let sections = (0..section_count).map(|_| ChunkSection::new_empty()).collect();
        Self::from_sections(pos, min_y, sections)
    }

    /// Creates a chunk from existing sections. The chunk starts clean.
    #[must_use]
    pub fn from_sections(pos: ChunkPos, min_y: i32, sections: Box<[ChunkSection]>) -> Self {
        Self {
            pos,
            min_y,
            sections,
            block_entities: FxHashMap::default(),
            saved_inventories: FxHashMap::default(),
            dirty: false,
            retired: false,
        }
    }

    /// The lowest block y coordinate.
    #[must_use]
    pub fn min_y(&self) -> i32 {
        self.min_y
    }

    /// The height in blocks.
    #[must_use]
    pub fn height(&self) -> i32 {
        (self.sections.len() * SECTION_SIZE) as i32
    }

    /// The sections from bottom to top.
    #[must_use]
    pub fn sections(&self) -> &[ChunkSection] {
        &self.sections
    }

    /// Mutable access to the sections. Marks the chunk dirty.
    pub fn sections_mut(&mut self) -> &mut [ChunkSection] {
        self.dirty = true;
        &mut self.sections
    }

    fn locate(&self, pos: BlockPos) -> Option<(usize, usize, usize, usize)> {
        debug_assert_eq!(pos.chunk_pos(), self.pos);
        let relative_y = pos.y().checked_sub(self.min_y)?;
        if relative_y < 0 || relative_y >= self.height() {
            return None;
        }
        let relative_y = relative_y as usize;
        let (x, z) = pos.local_xz();
        Some((relative_y / SECTION_SIZE, x, relative_y % SECTION_SIZE, z))
    }

    /// Gets the block at a world position inside this chunk. Out-of-range heights read as air.
    #[must_use]
    pub fn block(&self, pos: BlockPos) -> BlockState {
        match self.locate(pos) {
            Some((section, x, y, z)) => self.sections[section].block(x, y, z).clone(),
            None => BlockState::air(),
        }
    }

    /// Sets the block at a world position, returning the previous block.
    ///
    /// Returns `None` without changing anything if the height is out of range.
    pub fn set_block(&mut self, pos: BlockPos, state: BlockState) -> Option<BlockState> {
        let (section, x, y, z) = self.locate(pos)?;
        self.dirty = true;
        Some(self.sections[section].set_block(x, y, z, state))
    }

    /// Gets the liquid sharing a position with another block.
    #[must_use]
    pub fn liquid(&self, pos: BlockPos) -> Option<BlockState> {
        let (section, x, y, z) = self.locate(pos)?;
        self.sections[section].liquid(x, y, z).cloned()
    }

    /// Sets or clears the liquid sharing a position with another block.
    pub fn set_liquid(&mut self, pos: BlockPos, liquid: Option<BlockState>) {
        if let Some((section, x, y, z)) = self.locate(pos) {
            self.dirty = true;
            self.sections[section].set_liquid(x, y, z, liquid);
        }
    }

    /// Gets the biome at a world position.
    #[must_use]
    pub fn biome(&self, pos: BlockPos) -> Option<u32> {
        let (section, x, _, z) = self.locate(pos)?;
        Some(self.sections[section].biome(x, z))
    }

    /// Sets the biome at a world position.
    pub fn set_biome(&mut self, pos: BlockPos, biome: u32) {
        if let Some((section, x, _, z)) = self.locate(pos) {
            self.dirty = true;
            self.sections[section].set_biome(x, z, biome);
        }
    }

    /// Gets the block entity at a position.
    #[must_use]
    pub fn block_entity(&self, pos: BlockPos) -> Option<&dyn BlockEntity> {
        self.block_entities.get(&pos).map(Box::as_ref)
    }

    /// Gets the block entity at a position mutably. Marks the chunk dirty.
    pub fn block_entity_mut(&mut self, pos: BlockPos) -> Option<&mut (dyn BlockEntity + 'static)> {
        let entity = self.block_entities.get_mut(&pos)?;
        self.dirty = true;
        Some(entity.as_mut())
    }

    /// Downcasts the block entity at a position.
    #[must_use]
    pub fn block_entity_as<T: BlockEntity>(&self, pos: BlockPos) -> Option<&T> {
        self.block_entity(pos)?.as_any().downcast_ref()
    }

    /// Downcasts the block entity at a position mutably. Marks the chunk dirty.
    pub fn block_entity_as_mut<T: BlockEntity>(&mut self, pos: BlockPos) -> Option<&mut T> {
        self.block_entity_mut(pos)?.as_any_mut().downcast_mut()
    }

    /// Inserts a block entity at its own position, returning the one it replaced.
    pub fn insert_block_entity(
        &mut self,
        entity: Box<dyn BlockEntity>,
    ) -> Option<Box<dyn BlockEntity>> {
        self.dirty = true;
        self.block_entities.insert(entity.get_block_pos(), entity)
    }

    /// Removes the block entity at a position.
    pub fn remove_block_entity(&mut self, pos: BlockPos) -> Option<Box<dyn BlockEntity>> {
        let removed = self.block_entities.remove(&pos);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Iterates over all block entities.
    pub fn block_entities(&self) -> impl Iterator<Item = &dyn BlockEntity> {
        self.block_entities.values().map(Box::as_ref)
    }

    /// Positions of all block entities.
    #[must_use]
    pub fn block_entity_positions(&self) -> Vec<BlockPos> {
        self.block_entities.keys().copied().collect()
    }

    /// Whether the chunk has been modified since it was last saved.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the chunk as modified.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Marks the chunk as saved.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Returns true if any block entity inventory changed since the last call, and remembers
    /// the current contents as seen.
    ///
    /// Inventories change without the chunk lock, and a paired chest shares its inventory
    /// with a chunk next door, so they are tracked by revision rather than the dirty flag.
    pub fn take_inventory_changes(&mut self) -> bool {
        let current: FxHashMap<BlockPos, (ContainerId, u64)> = self
            .block_entities
            .iter()
            .filter_map(|(pos, entity)| {
                let inventory = entity.inventory()?;
                Some((*pos, (inventory.id(), inventory.revision())))
            })
            .collect();
        let changed = current != self.saved_inventories;
        self.saved_inventories = current;
        changed
    }

    /// Whether the chunk has been taken out of the world.
    ///
    /// Writers that obtained the chunk before it was unloaded must look it up again.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub(crate) fn retire(&mut self) {
        self.retired = true;
    }

    /// Compacts the palettes of every section.
    pub fn compact(&mut self) {
        for section in &mut self.sections {
            section.compact();
        }
    }
}

impl std::fmt::Debug for LevelChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelChunk")
            .field("pos", &self.pos)
            .field("min_y", &self.min_y)
            .field("sections", &self.sections.len())
            .field("block_entities", &self.block_entities.len())
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use cinder_utils::Identifier;

    use super::*;

    fn stone() -> BlockState {
        BlockState::new(Identifier::vanilla_static("stone"))
    }

    #[test]
    fn heights_map_to_sections() {
        let mut chunk = LevelChunk::new(ChunkPos::new(-1, 2), -64, 384);
        assert_eq!(chunk.sections().len(), 24);

        let pos = BlockPos::new(-3, -64, 40);
        assert_eq!(chunk.set_block(pos, stone()), Some(BlockState::air()));
        assert_eq!(chunk.block(pos), stone());
        assert!(chunk.sections()[0].block(13, 0, 8) == &stone());
        assert!(chunk.is_dirty());
    }

    #[test]
    fn out_of_range_heights_are_ignored() {
        let mut chunk = LevelChunk::new(ChunkPos::new(0, 0), 0, 256);
        assert_eq!(chunk.set_block(BlockPos::new(0, 256, 0), stone()), None);
        assert_eq!(chunk.set_block(BlockPos::new(0, -1, 0), stone()), None);
        assert!(chunk.block(BlockPos::new(0, 300, 0)).is_air());
        assert!(!chunk.is_dirty());
    }

    #[test]
    fn inventory_changes_are_seen_once() {
        use std::sync::Arc;

        use cinder_registry::ItemStack;

        use crate::{block_entity::entities::ChestBlockEntity, viewer::ViewerRegistry};

        let viewers = Arc::new(ViewerRegistry::new());
        let pos = BlockPos::new(3, 10, 3);
        let mut chunk = LevelChunk::new(ChunkPos::new(0, 0), 0, 256);
        chunk.insert_block_entity(Box::new(ChestBlockEntity::new(pos, &viewers)));
        assert!(chunk.take_inventory_changes());
        assert!(!chunk.take_inventory_changes());

        let inventory = chunk
            .block_entity(pos)
            .and_then(|entity| entity.inventory().cloned())
            .unwrap();
        inventory
            .set_item(0, ItemStack::new(Identifier::vanilla_static("apple"), 1))
            .unwrap();
        assert!(chunk.take_inventory_changes());
        assert!(!chunk.take_inventory_changes());
    }
}
