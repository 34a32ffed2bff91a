//! Double chests.
//!
//! Two chests of the same type and facing, placed side by side across their facing, pair
//! into one shared inventory. Pairing, unpairing and re-linking happen with both chunks
//! write-locked, so racing placements produce at most one pair. Viewers of the replaced
//! inventories are moved onto the new one once the chunk locks are released.

use std::{ops::Range, sync::Arc};

use cinder_utils::{BlockPos, ChunkPos};
use smallvec::{SmallVec, smallvec};

use super::{LockedChunks, World};
use crate::{
    block_entity::entities::{ChestBlockEntity, ChestPairing},
    inventory::{DOUBLE_CHEST_SIZE, Inventory, SINGLE_CHEST_SIZE},
};

/// Inventories replaced while the chunks were locked, and the inventory that replaced them.
type Rehome = (SmallVec<[Arc<Inventory>; 2]>, Arc<Inventory>);

fn chest(locked: &LockedChunks, pos: BlockPos) -> Option<&ChestBlockEntity> {
    locked.chunk(pos)?.block_entity_as::<ChestBlockEntity>(pos)
}

fn chest_mut(locked: &mut LockedChunks, pos: BlockPos) -> Option<&mut ChestBlockEntity> {
    locked.chunk_mut(pos)?.block_entity_as_mut::<ChestBlockEntity>(pos)
}

/// Returns true if the chests at `a` and `b` may pair.
fn can_pair(locked: &LockedChunks, a: BlockPos, b: BlockPos) -> bool {
    let (Some(chunk_a), Some(chunk_b)) = (locked.chunk(a), locked.chunk(b)) else {
        return false;
    };
    let (state_a, state_b) = (chunk_a.block(a), chunk_b.block(b));
    if !state_a.is_same_block(&state_b) {
        return false;
    }
    let Some(facing) = state_a.facing() else {
        return false;
    };
    if state_b.facing() != Some(facing) {
        return false;
    }
    let across = if facing.is_z_axis() {
        a.z() == b.z()
    } else {
        a.x() == b.x()
    };
    across
        && [a, b].into_iter().all(|pos| {
            chest(locked, pos).is_some_and(|chest| chest.pairing().is_none())
        })
}

impl World {
    /// Reacts to a change at `changed` next to the chest at `pos`.
    ///
    /// A paired chest whose partner changed unpairs if the partner is gone; an unpaired
    /// chest tries to pair with the changed block.
    pub fn update_chest_pairing(&self, pos: BlockPos, changed: BlockPos) {
        match self.with_block_entity(pos, ChestBlockEntity::pairing) {
            Some(Some(pairing)) if pairing.partner == changed => self.unpair_if_orphaned(pos),
            Some(None) => {
                self.try_pair(pos, changed);
            }
            _ => {}
        }
    }

    /// Pairs the unpaired chests at `a` and `b`, with `a` as the lead half.
    ///
    /// The shared inventory holds `a`'s items in slots `0..27` and `b`'s in `27..54`.
    /// Returns true if the chests were paired.
    pub fn try_pair(&self, a: BlockPos, b: BlockPos) -> bool {
        let adjacent = a.y() == b.y() && (a.x() - b.x()).abs() + (a.z() - b.z()).abs() == 1;
        if !adjacent {
            return false;
        }
        let rehome = {
            let Some(mut locked) = self.lock_loaded_chunks(&[a.chunk_pos(), b.chunk_pos()]) else {
                return false;
            };
            if !can_pair(&locked, a, b) {
                return false;
            }
            self.link_locked(&mut locked, a, b)
        };
        let Some(rehome) = rehome else {
            return false;
        };
        self.finish_rehome(rehome);
        log::debug!("Paired chests at {a} and {b}");
        true
    }

    /// Builds the shared inventory of `lead` and `follower` and links both halves to it.
    ///
    /// Both must be unlinked chests.
    fn link_locked(&self, locked: &mut LockedChunks, lead: BlockPos, follower: BlockPos) -> Option<Rehome> {
        let shared = Inventory::new(DOUBLE_CHEST_SIZE, self.viewers.clone(), &[lead, follower]);
        let mut replaced = SmallVec::new();
        for (pos, partner, is_lead, offset) in [
            (lead, follower, true, 0),
            (follower, lead, false, SINGLE_CHEST_SIZE),
        ] {
            let chest = chest_mut(locked, pos)?;
            let old = chest.chest_inventory().clone();
            shared.fill_silently(offset, old.drain_silently());
            chest.link(
                ChestPairing {
                    partner,
                    lead: is_lead,
                },
                shared.clone(),
            );
            replaced.push(old);
        }
        Some((replaced, shared))
    }

    /// Unpairs the chest at `pos` if its partner is no longer a chest paired back to it.
    ///
    /// The chest keeps its own half of the items. Nothing happens while the partner's chunk
    /// is unloaded.
    pub(crate) fn unpair_if_orphaned(&self, pos: BlockPos) {
        let Some(Some(pairing)) = self.with_block_entity(pos, ChestBlockEntity::pairing) else {
            return;
        };
        let rehome = {
            let Some(mut locked) =
                self.lock_loaded_chunks(&[pos.chunk_pos(), pairing.partner.chunk_pos()])
            else {
                return;
            };
            let partner_paired_back = chest(&locked, pairing.partner)
                .and_then(ChestBlockEntity::pairing)
                .is_some_and(|partner| partner.partner == pos);
            if partner_paired_back {
                return;
            }
            let Some(chest) = chest_mut(&mut locked, pos) else {
                return;
            };
            if chest.pairing() != Some(pairing) {
                return;
            }
            let own = chest.own_half();
            let old = chest.chest_inventory().clone();
            let fresh = Inventory::new(SINGLE_CHEST_SIZE, self.viewers.clone(), &[pos]);
            let items = old.drain_silently();
            fresh.fill_silently(0, items.get(own).unwrap_or_default().iter().cloned());
            chest.unpair(fresh.clone());
            (smallvec![old], fresh)
        };
        self.finish_rehome(rehome);
        log::debug!("Unpaired chest at {pos} from {}", pairing.partner);
    }

    /// Re-links the paired chests of a freshly loaded chunk whose partners are loaded.
    ///
    /// A chest whose loaded partner no longer pairs back is unpaired.
    pub(crate) fn link_loaded_pairs(&self, chunk: ChunkPos) {
        let candidates: Vec<(BlockPos, BlockPos)> = self
            .with_chunk(chunk, |chunk| {
                chunk
                    .block_entities()
                    .filter_map(|entity| {
                        let chest = entity.as_any().downcast_ref::<ChestBlockEntity>()?;
                        let pairing = chest.pairing()?;
                        (!chest.is_linked()).then_some((entity.get_block_pos(), pairing.partner))
                    })
                    .collect()
            })
            .unwrap_or_default();

        for (pos, partner) in candidates {
            let rehome = {
                let Some(mut locked) =
                    self.lock_loaded_chunks(&[pos.chunk_pos(), partner.chunk_pos()])
                else {
                    continue;
                };
                let halves = chest(&locked, pos)
                    .zip(chest(&locked, partner))
                    .and_then(|(this, other)| {
                        let (this_pairing, other_pairing) = (this.pairing()?, other.pairing()?);
                        let symmetric = this_pairing.partner == partner
                            && other_pairing.partner == pos
                            && !this.is_linked()
                            && !other.is_linked();
                        symmetric.then_some((this_pairing.lead, other_pairing.lead))
                    });
                let Some((this_lead, other_lead)) = halves else {
                    drop(locked);
                    self.unpair_if_orphaned(pos);
                    continue;
                };
                let this_leads = if this_lead == other_lead {
                    (pos.x(), pos.z()) < (partner.x(), partner.z())
                } else {
                    this_lead
                };
                let (lead, follower) = if this_leads { (pos, partner) } else { (partner, pos) };
                self.link_locked(&mut locked, lead, follower)
            };
            if let Some(rehome) = rehome {
                self.finish_rehome(rehome);
                log::debug!("Re-linked chests at {pos} and {partner}");
            }
        }
    }

    /// Gives each linked chest in `chunk` whose partner lives in another chunk its own
    /// inventory again, keeping the pairing. The partner keeps the viewers.
    pub(crate) fn split_pairs_for_unload(&self, chunk: ChunkPos) {
        let candidates: Vec<(BlockPos, BlockPos)> = self
            .with_chunk(chunk, |level_chunk| {
                level_chunk
                    .block_entities()
                    .filter_map(|entity| {
                        let chest = entity.as_any().downcast_ref::<ChestBlockEntity>()?;
                        let pairing = chest.pairing()?;
                        (chest.is_linked() && pairing.partner.chunk_pos() != chunk)
                            .then_some((entity.get_block_pos(), pairing.partner))
                    })
                    .collect()
            })
            .unwrap_or_default();

        for (pos, partner) in candidates {
            let rehome = {
                let Some(mut locked) =
                    self.lock_loaded_chunks(&[pos.chunk_pos(), partner.chunk_pos()])
                else {
                    continue;
                };
                let linked = chest(&locked, pos)
                    .zip(chest(&locked, partner))
                    .filter(|(this, other)| {
                        this.is_linked()
                            && other.is_linked()
                            && Arc::ptr_eq(this.chest_inventory(), other.chest_inventory())
                    })
                    .map(|(this, other)| {
                        (this.chest_inventory().clone(), this.own_half(), other.own_half())
                    });
                let Some((shared, this_half, other_half)) = linked else {
                    continue;
                };

                let items = shared.drain_silently();
                let split = |at: BlockPos, half: Range<usize>| {
                    let inventory = Inventory::new(SINGLE_CHEST_SIZE, self.viewers.clone(), &[at]);
                    inventory.fill_silently(0, items.get(half).unwrap_or_default().iter().cloned());
                    inventory
                };
                let (this_inventory, other_inventory) = (split(pos, this_half), split(partner, other_half));
                if let Some(this) = chest_mut(&mut locked, pos) {
                    this.detach(this_inventory);
                }
                if let Some(other) = chest_mut(&mut locked, partner) {
                    other.detach(other_inventory.clone());
                }
                (smallvec![shared], other_inventory)
            };
            self.finish_rehome(rehome);
            log::debug!("Split chest pair {pos} and {partner} for unloading");
        }
    }

    /// Moves the viewers of the replaced inventories onto their successor.
    fn finish_rehome(&self, (from, to): Rehome) {
        let from: SmallVec<[_; 2]> = from.iter().map(|inventory| inventory.id()).collect();
        self.viewers.rehome(&from, to.id(), |positions, action| {
            self.broadcast_action(positions, action);
        });
    }
}
