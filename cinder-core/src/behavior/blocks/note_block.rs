//! Note block behavior implementation.
//!
//! The pitch lives in the block entity. Using the block cycles through the 25 pitches.

use std::sync::Arc;

use cinder_registry::BlockState;
use cinder_utils::BlockPos;

use crate::{
    behavior::{BlockBehaviour, BlockEntityProvider},
    block_entity::{BlockEntityKind, entities::NoteBlockEntity},
    viewer::Viewer,
    world::{SetBlockOptions, World},
};

/// Behavior for note blocks.
pub struct NoteBlock;

impl BlockBehaviour for NoteBlock {
    fn use_without_item(
        &self,
        world: &World,
        pos: BlockPos,
        state: &BlockState,
        _user: &Arc<dyn Viewer>,
    ) -> bool {
        let pitch = world
            .with_block_entity(pos, |entity: &NoteBlockEntity| entity.next_pitch())
            .unwrap_or(0);
        world.set_block_with_entity(
            pos,
            state.clone(),
            Box::new(NoteBlockEntity::with_pitch(pos, pitch)),
            SetBlockOptions::QUIET,
        );
        log::debug!("Note block at {pos} plays pitch {pitch}");
        true
    }

    fn as_block_entity_provider(&self) -> Option<&dyn BlockEntityProvider> {
        Some(self)
    }
}

impl BlockEntityProvider for NoteBlock {
    fn block_entity_kind(&self) -> BlockEntityKind {
        BlockEntityKind::NoteBlock
    }
}
