//! This module contains the `World` struct: the loaded chunks of one dimension and the verbs
//! that read and change them.
//!
//! Locks are always taken in this order:
//!
//! 1. the lifecycle stripe of a chunk position (load and unload only),
//! 2. the chunk map,
//! 3. chunk locks, in ascending [`ChunkPos`] order,
//! 4. viewer registry entries, lower [`ContainerId`](crate::inventory::ContainerId) first,
//! 5. inventory slots.
//!
//! The update queue, drop list, random source and chunk viewer sets are leaves. Block
//! behaviours are only ever invoked with none of these held.

mod chunk_lifecycle;
mod pairing;
mod session;
#[cfg(test)]
mod tests;

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use cinder_registry::{BlockState, ItemStack, LegacyBlockMapping};
use cinder_utils::{
    BlockPos, ChunkPos, Direction, ViewerId,
    locks::{ArcSyncRwLockWriteGuard, SyncMutex, SyncRwLock},
};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

pub use chunk_lifecycle::SaveReport;
pub use session::SessionGuard;

use crate::{
    behavior::BlockBehaviours,
    block_entity::BlockEntity,
    chunk::{chunk_generator::ChunkGeneratorType, level_chunk::LevelChunk},
    chunk_saver::ChunkStorage,
    inventory::Inventory,
    ticks::ScheduledUpdateQueue,
    viewer::{AddViewerError, BlockAction, Viewer, ViewerHandle, ViewerRegistry},
};

use chunk_lifecycle::PendingSave;

type ChunkHandle = Arc<SyncRwLock<LevelChunk>>;

const LIFECYCLE_STRIPES: usize = 64;
const OPEN_ATTEMPTS: usize = 8;

/// Fixed properties of a world.
#[derive(Debug, Clone)]
pub struct WorldSettings {
    /// The dimension name chunks are stored under.
    pub dimension: String,
    /// The lowest block y coordinate.
    pub min_y: i32,
    /// The height in blocks, a multiple of 16.
    pub height: i32,
    /// Random positions picked per non-empty section each tick.
    pub random_tick_speed: u32,
    /// The most scheduled updates run in one tick.
    pub max_scheduled_updates_per_tick: usize,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            dimension: "overworld".to_string(),
            min_y: -64,
            height: 384,
            random_tick_speed: 1,
            max_scheduled_updates_per_tick: 65_536,
        }
    }
}

/// Flags for [`World::set_block`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetBlockOptions {
    /// Skip neighbour updates.
    pub suppress_block_updates: bool,
    /// Leave the liquid layer untouched.
    pub suppress_liquid_displacement: bool,
}

impl SetBlockOptions {
    /// Changes only the block itself.
    pub const QUIET: Self = Self {
        suppress_block_updates: true,
        suppress_liquid_displacement: true,
    };
}

/// An item stack dropped into the world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDrop {
    /// Where it was dropped.
    pub pos: BlockPos,
    /// The stack.
    pub stack: ItemStack,
}

/// Chunks locked together for a multi-chunk operation.
pub(crate) struct LockedChunks {
    guards: SmallVec<[(ChunkPos, ArcSyncRwLockWriteGuard<LevelChunk>); 2]>,
}

impl LockedChunks {
    /// The locked chunk containing `pos`.
    pub(crate) fn chunk(&self, pos: BlockPos) -> Option<&LevelChunk> {
        let chunk_pos = pos.chunk_pos();
        self.guards
            .iter()
            .find(|(locked, _)| *locked == chunk_pos)
            .map(|(_, guard)| &**guard)
    }

    /// The locked chunk containing `pos`, mutably.
    pub(crate) fn chunk_mut(&mut self, pos: BlockPos) -> Option<&mut LevelChunk> {
        let chunk_pos = pos.chunk_pos();
        self.guards
            .iter_mut()
            .find(|(locked, _)| *locked == chunk_pos)
            .map(|(_, guard)| &mut **guard)
    }
}

/// A struct that represents a world.
pub struct World {
    settings: WorldSettings,
    chunks: scc::HashMap<ChunkPos, ChunkHandle>,
    lifecycle: Box<[SyncMutex<()>]>,
    pending_saves: SyncMutex<FxHashMap<ChunkPos, PendingSave>>,
    save_generation: AtomicU64,
    tick: AtomicU64,
    updates: SyncMutex<ScheduledUpdateQueue>,
    viewers: Arc<ViewerRegistry>,
    chunk_viewers: SyncRwLock<FxHashMap<ChunkPos, FxHashMap<ViewerId, ViewerHandle>>>,
    sessions: scc::HashMap<ViewerId, ViewerHandle>,
    storage: ChunkStorage,
    generator: ChunkGeneratorType,
    legacy: Arc<LegacyBlockMapping>,
    behaviours: Arc<BlockBehaviours>,
    drops: SyncMutex<Vec<ItemDrop>>,
    rng: SyncMutex<SmallRng>,
}

impl World {
    /// Creates a world with no chunks loaded.
    #[must_use]
    pub fn new(
        settings: WorldSettings,
        storage: ChunkStorage,
        generator: ChunkGeneratorType,
        legacy: Arc<LegacyBlockMapping>,
        behaviours: Arc<BlockBehaviours>,
    ) -> Self {
        log::info!(
            "Creating world {} ({} storage, height {} from y={})",
            settings.dimension,
            storage.name(),
            settings.height,
            settings.min_y
        );
        Self {
            settings,
            chunks: scc::HashMap::new(),
            lifecycle: (0..LIFECYCLE_STRIPES).map(|_| SyncMutex::new(())).collect(),
            pending_saves: SyncMutex::new(FxHashMap::default()),
            save_generation: AtomicU64::new(0),
            tick: AtomicU64::new(0),
            updates: SyncMutex::new(ScheduledUpdateQueue::new()),
            viewers: Arc::new(ViewerRegistry::new()),
            chunk_viewers: SyncRwLock::new(FxHashMap::default()),
            sessions: scc::HashMap::new(),
            storage,
            generator,
            legacy,
            behaviours,
            drops: SyncMutex::new(Vec::new()),
            rng: SyncMutex::new(SmallRng::from_os_rng()),
        }
    }

    /// The world's settings.
    #[must_use]
    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// The current tick.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::Acquire)
    }

    /// The registry of container viewers.
    #[must_use]
    pub fn viewer_registry(&self) -> &Arc<ViewerRegistry> {
        &self.viewers
    }

    /// The block behaviours.
    #[must_use]
    pub fn behaviours(&self) -> &Arc<BlockBehaviours> {
        &self.behaviours
    }

    fn chunk(&self, pos: ChunkPos) -> Option<ChunkHandle> {
        self.chunks.read_sync(&pos, |_, chunk| chunk.clone())
    }

    /// Returns true if the chunk is loaded.
    #[must_use]
    pub fn is_chunk_loaded(&self, pos: ChunkPos) -> bool {
        self.chunks.read_sync(&pos, |_, _| ()).is_some()
    }

    /// Returns true if `pos` is inside the world's height and its chunk is loaded.
    #[must_use]
    pub fn is_loaded(&self, pos: BlockPos) -> bool {
        self.in_height(pos) && self.is_chunk_loaded(pos.chunk_pos())
    }

    /// The positions of every loaded chunk.
    #[must_use]
    pub fn loaded_chunks(&self) -> Vec<ChunkPos> {
        let mut loaded = Vec::with_capacity(self.chunks.len());
        self.chunks.iter_sync(|pos, _| {
            loaded.push(*pos);
            true
        });
        loaded
    }

    /// The number of loaded chunks.
    #[must_use]
    pub fn loaded_chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn in_height(&self, pos: BlockPos) -> bool {
        (self.settings.min_y..self.settings.min_y + self.settings.height).contains(&pos.y())
    }

    /// Runs `f` with the chunk read-locked. Returns `None` if the chunk is not loaded.
    pub(crate) fn with_chunk<R>(&self, pos: ChunkPos, f: impl FnOnce(&LevelChunk) -> R) -> Option<R> {
        loop {
            let handle = self.chunk(pos)?;
            let chunk = handle.read();
            // An unloaded chunk is removed from the map before its lock is released.
            if !chunk.is_retired() {
                return Some(f(&chunk));
            }
        }
    }

    /// Runs `f` with the chunk write-locked. Returns `None` if the chunk is not loaded.
    pub(crate) fn with_chunk_mut<R>(
        &self,
        pos: ChunkPos,
        f: impl FnOnce(&mut LevelChunk) -> R,
    ) -> Option<R> {
        loop {
            let handle = self.chunk(pos)?;
            let mut chunk = handle.write();
            if !chunk.is_retired() {
                return Some(f(&mut chunk));
            }
        }
    }

    /// Write-locks every chunk in `positions` in ascending order.
    ///
    /// Returns `None` if any of them is not loaded.
    pub(crate) fn lock_loaded_chunks(&self, positions: &[ChunkPos]) -> Option<LockedChunks> {
        let mut sorted: SmallVec<[ChunkPos; 2]> = positions.iter().copied().collect();
        sorted.sort_unstable();
        sorted.dedup();

        'retry: loop {
            let mut guards = SmallVec::new();
            for pos in &sorted {
                let guard = self.chunk(*pos)?.write_arc();
                if guard.is_retired() {
                    continue 'retry;
                }
                guards.push((*pos, guard));
            }
            return Some(LockedChunks { guards });
        }
    }

    /// Gets the block at `pos`. Unloaded positions read as air.
    #[must_use]
    pub fn block(&self, pos: BlockPos) -> BlockState {
        self.with_chunk(pos.chunk_pos(), |chunk| chunk.block(pos))
            .unwrap_or_else(BlockState::air)
    }

    /// Gets the liquid sharing `pos` with the block there, if any.
    #[must_use]
    pub fn liquid(&self, pos: BlockPos) -> Option<BlockState> {
        self.with_chunk(pos.chunk_pos(), |chunk| chunk.liquid(pos))
            .flatten()
    }

    /// Gets the biome id at `pos`.
    #[must_use]
    pub fn biome(&self, pos: BlockPos) -> Option<u32> {
        self.with_chunk(pos.chunk_pos(), |chunk| chunk.biome(pos))
            .flatten()
    }

    /// Sets the block at `pos`.
    ///
    /// Returns false if the chunk is not loaded, the position is outside the world's height
    /// or the block already is `state`.
    pub fn set_block(&self, pos: BlockPos, state: BlockState, options: SetBlockOptions) -> bool {
        self.replace_block(pos, state, None, options)
    }

    /// Sets the block at `pos` together with its block entity, replacing any existing one.
    pub fn set_block_with_entity(
        &self,
        pos: BlockPos,
        state: BlockState,
        entity: Box<dyn BlockEntity>,
        options: SetBlockOptions,
    ) -> bool {
        debug_assert_eq!(entity.get_block_pos(), pos);
        self.replace_block(pos, state, Some(entity), options)
    }

    fn replace_block(
        &self,
        pos: BlockPos,
        state: BlockState,
        mut entity: Option<Box<dyn BlockEntity>>,
        options: SetBlockOptions,
    ) -> bool {
        if !self.in_height(pos) {
            return false;
        }
        let behaviours = &self.behaviours;
        let behaviour = behaviours.get(&state);

        let outcome = self
            .with_chunk_mut(pos.chunk_pos(), |chunk| {
                let old = chunk.block(pos);
                if old == state && entity.is_none() {
                    return None;
                }

                if !options.suppress_liquid_displacement {
                    let liquid = chunk
                        .liquid(pos)
                        .or_else(|| behaviours.get(&old).as_liquid().map(|_| old.clone()));
                    let kept = match (behaviour.as_liquid(), behaviour.as_liquid_displacer(), liquid) {
                        (None, Some(displacer), Some(liquid)) if displacer.can_displace(&liquid) => {
                            Some(liquid)
                        }
                        _ => None,
                    };
                    chunk.set_liquid(pos, kept);
                }

                chunk.set_block(pos, state.clone());
                let replaced = !old.is_same_block(&state);
                let mut removed = if replaced {
                    chunk.remove_block_entity(pos)
                } else {
                    None
                };
                if let Some(entity) = entity.take() {
                    removed = chunk.insert_block_entity(entity).or(removed);
                } else if chunk.block_entity(pos).is_none()
                    && let Some(provider) = behaviour.as_block_entity_provider()
                {
                    chunk.insert_block_entity(provider.block_entity_kind().create(pos, &self.viewers));
                }
                Some((old, replaced, removed))
            })
            .flatten();

        let Some((old, replaced, removed)) = outcome else {
            return false;
        };
        if replaced || removed.is_some() {
            behaviours.get(&old).on_remove(self, pos, &old, removed);
        }
        if !options.suppress_block_updates {
            self.dispatch_neighbour_updates(pos);
        }
        true
    }

    fn dispatch_neighbour_updates(&self, pos: BlockPos) {
        let targets = Direction::ALL
            .into_iter()
            .map(|direction| pos.relative(direction))
            .chain(std::iter::once(pos));
        for target in targets {
            if !self.is_loaded(target) {
                continue;
            }
            let state = self.block(target);
            self.behaviours
                .get(&state)
                .neighbour_update(self, target, &state, pos);
        }
    }

    /// Calls `f` with each loaded face neighbour of `pos` and its block.
    pub fn neighbours(&self, pos: BlockPos, mut f: impl FnMut(BlockPos, BlockState)) {
        for direction in Direction::ALL {
            let neighbour = pos.relative(direction);
            if self.is_loaded(neighbour) {
                f(neighbour, self.block(neighbour));
            }
        }
    }

    /// Runs `f` on the block entity at `pos` if it is a `T`.
    pub fn with_block_entity<T: BlockEntity, R>(&self, pos: BlockPos, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.with_chunk(pos.chunk_pos(), |chunk| chunk.block_entity_as::<T>(pos).map(f))
            .flatten()
    }

    /// The inventory of the block entity at `pos`.
    #[must_use]
    pub fn inventory(&self, pos: BlockPos) -> Option<Arc<Inventory>> {
        self.with_chunk(pos.chunk_pos(), |chunk| {
            chunk
                .block_entity(pos)
                .and_then(|entity| entity.inventory().cloned())
        })
        .flatten()
    }

    /// Schedules an update of `pos` in `delay` ticks, capturing the block there now.
    ///
    /// Replaces any update already pending for `pos`. Returns the due tick, or `None` if the
    /// chunk is not loaded.
    pub fn schedule_update(&self, pos: BlockPos, delay: u64) -> Option<u64> {
        let state = self.with_chunk(pos.chunk_pos(), |chunk| chunk.block(pos))?;
        let now = self.current_tick();
        Some(self.updates.lock().schedule(pos, state, now, delay))
    }

    /// The tick the pending update of `pos` is due on.
    #[must_use]
    pub fn pending_update(&self, pos: BlockPos) -> Option<u64> {
        self.updates.lock().due_tick_of(pos)
    }

    /// Advances the world by one tick and returns the new tick.
    ///
    /// Runs the scheduled updates that are due, then the random ticks.
    pub fn tick(&self) -> u64 {
        let tick = self.tick.fetch_add(1, Ordering::AcqRel) + 1;
        let _span = tracing::trace_span!("world_tick", tick).entered();

        self.run_scheduled_updates(tick);
        if self.settings.random_tick_speed > 0 && self.behaviours.any_random_ticks() {
            self.run_random_ticks();
        }
        tick
    }

    fn run_scheduled_updates(&self, tick: u64) {
        let due = self
            .updates
            .lock()
            .due_entries(tick, self.settings.max_scheduled_updates_per_tick);
        for update in due {
            let Some(current) = self.with_chunk(update.pos.chunk_pos(), |chunk| chunk.block(update.pos))
            else {
                continue;
            };
            if current != update.state {
                log::trace!("Dropping update at {} because the block changed", update.pos);
                continue;
            }
            self.behaviours
                .get(&current)
                .scheduled_update(self, update.pos, &current);
        }
    }

    fn run_random_ticks(&self) {
        let mut handles = Vec::with_capacity(self.chunks.len());
        self.chunks.iter_sync(|_, chunk| {
            handles.push(chunk.clone());
            true
        });

        let speed = self.settings.random_tick_speed;
        let mut picked = Vec::new();
        for handle in handles {
            let chunk = handle.read();
            if chunk.is_retired() {
                continue;
            }
            let mut rng = self.rng.lock();
            for (index, section) in chunk.sections().iter().enumerate() {
                if section.is_empty() {
                    continue;
                }
                for _ in 0..speed {
                    let (x, y, z) = (
                        rng.random_range(0..16usize),
                        rng.random_range(0..16usize),
                        rng.random_range(0..16usize),
                    );
                    let state = section.block(x, y, z);
                    if self.behaviours.get(state).ticks_randomly() {
                        let pos = BlockPos::new(
                            chunk.pos.min_block_x() + x as i32,
                            chunk.min_y() + (index * 16 + y) as i32,
                            chunk.pos.min_block_z() + z as i32,
                        );
                        picked.push((pos, state.clone()));
                    }
                }
            }
        }

        for (pos, state) in picked {
            if self.block(pos) == state {
                self.behaviours.get(&state).random_tick(self, pos, &state);
            }
        }
    }

    /// Lets `user` use the block at `pos` with an empty hand. Returns true if the block
    /// handled it.
    pub fn use_block(&self, pos: BlockPos, user: &Arc<dyn Viewer>) -> bool {
        let state = self.block(pos);
        self.behaviours
            .get(&state)
            .use_without_item(self, pos, &state, user)
    }

    /// Opens the container at `pos` for `viewer`.
    ///
    /// The first viewer makes the container play its open action. Returns the inventory the
    /// viewer now watches, or `None` if there is no container.
    pub fn open_container(&self, pos: BlockPos, viewer: &Arc<dyn Viewer>) -> Option<Arc<Inventory>> {
        for _ in 0..OPEN_ATTEMPTS {
            let inventory = self.inventory(pos)?;
            match self.viewers.add_viewer(inventory.id(), ViewerHandle::new(viewer), |positions, action| {
                self.broadcast_action(positions, action);
            }) {
                Ok(_) => return Some(inventory),
                // The container was re-homed by a pairing change after it was looked up.
                Err(AddViewerError::Unregistered(id)) => {
                    log::debug!("Container {id} at {pos} was replaced while opening");
                }
            }
        }
        log::warn!("Giving up opening the container at {pos}");
        None
    }

    /// Closes the container at `pos` for `viewer`. Returns true if that closed the container
    /// for everyone.
    pub fn close_container(&self, pos: BlockPos, viewer: ViewerId) -> bool {
        let Some(inventory) = self.inventory(pos) else {
            return false;
        };
        self.viewers
            .remove_viewer(inventory.id(), viewer, |positions, action| {
                self.broadcast_action(positions, action);
            })
    }

    /// Unregisters an inventory whose block is gone, closing it for any remaining viewers.
    pub fn close_inventory(&self, inventory: &Inventory) {
        let closed = self.viewers.unregister(inventory.id(), |positions, action| {
            self.broadcast_action(positions, action);
        });
        if !closed.is_empty() {
            log::debug!("Closed container {} for {} viewers", inventory.id(), closed.len());
        }
    }

    /// Shows `action` at each of `positions` to everyone watching those chunks.
    pub fn broadcast_action(&self, positions: &[BlockPos], action: BlockAction) {
        for pos in positions {
            for viewer in self.viewers(*pos) {
                viewer.view_block_action(*pos, action);
            }
        }
    }

    /// The live viewers of the chunk containing `pos`.
    #[must_use]
    pub fn viewers(&self, pos: BlockPos) -> Vec<Arc<dyn Viewer>> {
        self.chunk_viewers
            .read()
            .get(&pos.chunk_pos())
            .map(|viewers| viewers.values().filter_map(ViewerHandle::upgrade).collect())
            .unwrap_or_default()
    }

    /// Starts showing a chunk to `viewer`.
    pub fn add_chunk_viewer(&self, chunk: ChunkPos, viewer: &Arc<dyn Viewer>) {
        self.chunk_viewers
            .write()
            .entry(chunk)
            .or_default()
            .insert(viewer.viewer_id(), ViewerHandle::new(viewer));
    }

    /// Stops showing a chunk to a viewer. Returns true if it was watching.
    pub fn remove_chunk_viewer(&self, chunk: ChunkPos, viewer: ViewerId) -> bool {
        let mut chunk_viewers = self.chunk_viewers.write();
        let Some(viewers) = chunk_viewers.get_mut(&chunk) else {
            return false;
        };
        let removed = viewers.remove(&viewer).is_some();
        viewers.retain(|_, handle| !handle.is_dead());
        if viewers.is_empty() {
            chunk_viewers.remove(&chunk);
        }
        removed
    }

    /// Queues items dropped at `pos` for the entity layer.
    pub fn drop_items(&self, pos: BlockPos, items: impl IntoIterator<Item = ItemStack>) {
        let mut drops = self.drops.lock();
        drops.extend(
            items
                .into_iter()
                .filter(|stack| !stack.is_empty())
                .map(|stack| ItemDrop { pos, stack }),
        );
    }

    /// Takes every queued item drop.
    pub fn take_drops(&self) -> Vec<ItemDrop> {
        std::mem::take(&mut *self.drops.lock())
    }
}
