//! Loading, unloading and saving chunks.
//!
//! A chunk's record moves through three places: the storage backend, the pending save map
//! and the loaded chunk map. An unloaded chunk's record enters the pending map before the
//! chunk leaves the loaded map, and leaves it only once the backend accepted it, so a load
//! racing a save always finds the newest data.

use std::sync::{Arc, atomic::Ordering};

use cinder_utils::{
    ChunkPos,
    locks::{SyncMutexGuard, SyncRwLock},
};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use rustc_hash::FxHashSet;

use super::World;
use crate::{
    chunk::{
        chunk_generator::ChunkGenerator,
        codec::{self, DecodeContext, DecodedChunk},
        level_chunk::LevelChunk,
    },
    error::{StorageError, WorldError},
    inventory::Inventory,
};

/// A record waiting to be accepted by the storage backend.
pub(super) struct PendingSave {
    generation: u64,
    data: Arc<Vec<u8>>,
}

/// The outcome of [`World::save_all`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SaveReport {
    /// Chunks written to storage.
    pub saved: usize,
    /// Chunks left alone because nothing changed.
    pub skipped: usize,
    /// Chunks the backend rejected. Their records stay queued for the next save.
    pub failed: usize,
}

impl World {
    fn lifecycle_lock(&self, pos: ChunkPos) -> SyncMutexGuard<'_, ()> {
        let hash = i64::from(pos.x())
            .wrapping_mul(31)
            .wrapping_add(i64::from(pos.z()));
        let stripe = hash.rem_euclid(self.lifecycle.len() as i64) as usize;
        self.lifecycle[stripe].lock()
    }

    /// Loads a chunk from storage, or generates it if storage has no record.
    ///
    /// Loading a loaded chunk does nothing. A record that cannot be read or decoded is an
    /// error and leaves the chunk unloaded.
    pub fn load_chunk(&self, pos: ChunkPos) -> Result<(), WorldError> {
        if self.is_chunk_loaded(pos) {
            return Ok(());
        }
        let _lifecycle = self.lifecycle_lock(pos);
        if self.is_chunk_loaded(pos) {
            return Ok(());
        }

        let pending = self
            .pending_saves
            .lock()
            .get(&pos)
            .map(|pending| pending.data.clone());
        let record = match pending {
            Some(data) => Some(data.to_vec()),
            None => self
                .storage
                .load(&self.settings.dimension, pos)
                .map_err(|err| WorldError::Load(pos, err))?,
        };

        let (chunk, updates) = if let Some(record) = record {
            let ctx = DecodeContext {
                legacy: &self.legacy,
                viewers: &self.viewers,
            };
            let DecodedChunk { chunk, updates } =
                codec::decode_chunk(pos, self.settings.min_y, self.settings.height, &record, &ctx)
                    .map_err(|err| WorldError::Load(pos, err))?;
            log::debug!("Loaded chunk {pos} with {} pending updates", updates.len());
            (chunk, updates)
        } else {
            let mut chunk = LevelChunk::new(pos, self.settings.min_y, self.settings.height);
            self.generator.generate(&mut chunk);
            chunk.take_inventory_changes();
            log::debug!("Generated chunk {pos}");
            (chunk, Vec::new())
        };

        if self
            .chunks
            .insert_sync(pos, Arc::new(SyncRwLock::new(chunk)))
            .is_err()
        {
            log::warn!("Chunk {pos} was inserted twice");
            return Ok(());
        }

        if !updates.is_empty() {
            let now = self.current_tick();
            let mut queue = self.updates.lock();
            for update in updates {
                queue.schedule(update.pos, update.state, now, update.delay);
            }
        }

        self.link_loaded_pairs(pos);
        Ok(())
    }

    /// Loads every chunk within `radius` of `center`. Returns the number of chunks loaded.
    pub fn preload(&self, center: ChunkPos, radius: i32) -> Result<usize, WorldError> {
        let mut loaded = 0;
        for x in -radius..=radius {
            for z in -radius..=radius {
                let pos = ChunkPos::new(center.x() + x, center.z() + z);
                if !self.is_chunk_loaded(pos) {
                    self.load_chunk(pos)?;
                    loaded += 1;
                }
            }
        }
        log::info!("Preloaded {loaded} chunks around {center}");
        Ok(loaded)
    }

    /// Saves and removes a chunk.
    ///
    /// Its scheduled updates are stored with the chunk, and its containers are closed for
    /// anyone viewing them. Returns `Ok(false)` if the chunk was not loaded. If the backend
    /// rejects the record it stays queued and is retried by the next [`World::save_all`].
    pub fn unload_chunk(&self, pos: ChunkPos) -> Result<bool, WorldError> {
        let _lifecycle = self.lifecycle_lock(pos);
        if !self.is_chunk_loaded(pos) {
            return Ok(false);
        }
        self.split_pairs_for_unload(pos);

        let Some(handle) = self.chunk(pos) else {
            return Ok(false);
        };
        let (pending, inventories) = {
            let mut chunk = handle.write();
            chunk.retire();
            let changed = chunk.is_dirty() | chunk.take_inventory_changes();
            let updates = self.updates.lock().remove_chunk(pos);
            let pending = (changed || !updates.is_empty()).then(|| {
                let record = codec::encode_chunk(&mut chunk, &updates, self.current_tick());
                self.queue_save(pos, record)
            });
            let inventories: Vec<Arc<Inventory>> = chunk
                .block_entities()
                .filter_map(|entity| entity.inventory().cloned())
                .collect();
            self.chunks.remove_sync(&pos);
            (pending, inventories)
        };

        for inventory in &inventories {
            self.close_inventory(inventory);
        }

        let Some((generation, record)) = pending else {
            log::debug!("Unloaded unchanged chunk {pos}");
            return Ok(true);
        };
        self.store(pos, generation, &record)
            .map_err(|err| WorldError::Save(pos, err))?;
        log::debug!("Unloaded and saved chunk {pos}");
        Ok(true)
    }

    /// Puts a record in the pending map, replacing any older one for the same chunk.
    fn queue_save(&self, pos: ChunkPos, record: Vec<u8>) -> (u64, Arc<Vec<u8>>) {
        let generation = self.save_generation.fetch_add(1, Ordering::Relaxed);
        let data = Arc::new(record);
        self.pending_saves.lock().insert(
            pos,
            PendingSave {
                generation,
                data: data.clone(),
            },
        );
        (generation, data)
    }

    /// Writes a queued record and drops it from the pending map unless a newer one
    /// replaced it. Callers hold the chunk's lifecycle stripe, so writes of one chunk never
    /// overtake each other.
    fn store(&self, pos: ChunkPos, generation: u64, record: &[u8]) -> Result<(), StorageError> {
        self.storage.save(&self.settings.dimension, pos, record)?;
        let mut pending = self.pending_saves.lock();
        if pending
            .get(&pos)
            .is_some_and(|pending| pending.generation == generation)
        {
            pending.remove(&pos);
        }
        Ok(())
    }

    /// Saves every loaded chunk that changed, then retries records still waiting from
    /// earlier failed saves.
    pub fn save_all(&self) -> SaveReport {
        let _span = tracing::debug_span!("save_all").entered();

        let results: Vec<(ChunkPos, Option<bool>)> = self
            .loaded_chunks()
            .into_par_iter()
            .map(|pos| (pos, self.save_loaded(pos)))
            .collect();

        let mut report = SaveReport::default();
        let mut attempted = FxHashSet::default();
        for (pos, result) in results {
            match result {
                Some(true) => report.saved += 1,
                Some(false) => report.failed += 1,
                None => {
                    report.skipped += 1;
                    continue;
                }
            }
            attempted.insert(pos);
        }

        // Records this pass already tried are left for the next one.
        let retries: Vec<ChunkPos> = self
            .pending_saves
            .lock()
            .keys()
            .filter(|pos| !attempted.contains(*pos))
            .copied()
            .collect();
        for pos in retries {
            let _lifecycle = self.lifecycle_lock(pos);
            let Some((generation, data)) = self
                .pending_saves
                .lock()
                .get(&pos)
                .map(|pending| (pending.generation, pending.data.clone()))
            else {
                continue;
            };
            match self.store(pos, generation, &data) {
                Ok(()) => report.saved += 1,
                Err(err) => {
                    log::error!("Failed to save chunk {pos} again: {err}");
                    report.failed += 1;
                }
            }
        }

        if report.failed > 0 {
            log::warn!(
                "Saved {} chunks, {} unchanged, {} failed",
                report.saved,
                report.skipped,
                report.failed
            );
        } else {
            log::info!("Saved {} chunks, {} unchanged", report.saved, report.skipped);
        }
        report
    }

    /// Saves one loaded chunk if it changed.
    ///
    /// Returns `None` if there was nothing to save, otherwise whether the backend accepted
    /// the record.
    fn save_loaded(&self, pos: ChunkPos) -> Option<bool> {
        let _lifecycle = self.lifecycle_lock(pos);
        let (generation, record) = self.with_chunk_mut(pos, |chunk| {
            let changed = chunk.is_dirty() | chunk.take_inventory_changes();
            if !changed {
                return None;
            }
            let updates = self.updates.lock().entries_in_chunk(pos);
            let record = codec::encode_chunk(chunk, &updates, self.current_tick());
            chunk.clear_dirty();
            Some(self.queue_save(pos, record))
        })??;

        match self.store(pos, generation, &record) {
            Ok(()) => Some(true),
            Err(err) => {
                log::error!("Failed to save chunk {pos}: {err}");
                Some(false)
            }
        }
    }

    /// The number of records the storage backend has not accepted yet.
    #[must_use]
    pub fn pending_save_count(&self) -> usize {
        self.pending_saves.lock().len()
    }
}
