//! Note block entity.

use std::any::Any;

use cinder_utils::BlockPos;
use simdnbt::owned::{NbtCompound, NbtTag};

use crate::block_entity::{BlockEntity, BlockEntityKind, nbt};

/// The highest pitch a note block plays. Pitches cycle through `0..=MAX_PITCH`.
pub const MAX_PITCH: u8 = 24;

/// Stores the pitch of a note block.
#[derive(Debug, Clone)]
pub struct NoteBlockEntity {
    pos: BlockPos,
    pitch: u8,
}

impl NoteBlockEntity {
    /// Creates a note block entity at pitch zero.
    #[must_use]
    pub fn new(pos: BlockPos) -> Self {
        Self { pos, pitch: 0 }
    }

    /// Creates a note block entity with the given pitch, wrapped into range.
    #[must_use]
    pub fn with_pitch(pos: BlockPos, pitch: u8) -> Self {
        Self {
            pos,
            pitch: pitch % (MAX_PITCH + 1),
        }
    }

    /// The current pitch.
    #[must_use]
    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    /// The pitch after this one, wrapping back to zero.
    #[must_use]
    pub fn next_pitch(&self) -> u8 {
        (self.pitch + 1) % (MAX_PITCH + 1)
    }
}

impl BlockEntity for NoteBlockEntity {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn get_type(&self) -> BlockEntityKind {
        BlockEntityKind::NoteBlock
    }

    fn get_block_pos(&self) -> BlockPos {
        self.pos
    }

    fn load_additional(&mut self, nbt: &NbtCompound) {
        let pitch = nbt::read_int(nbt, "note").unwrap_or(0);
        self.pitch = u8::try_from(pitch.rem_euclid(i64::from(MAX_PITCH) + 1)).unwrap_or(0);
    }

    fn save_additional(&self, nbt: &mut NbtCompound) {
        nbt.insert("note", NbtTag::Byte(self.pitch as i8));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_wraps_after_max() {
        let entity = NoteBlockEntity::with_pitch(BlockPos::new(0, 0, 0), MAX_PITCH);
        assert_eq!(entity.next_pitch(), 0);
    }

    #[test]
    fn out_of_range_pitch_is_wrapped_on_load() {
        let mut nbt = NbtCompound::new();
        nbt.insert("note", NbtTag::Byte(27));
        let mut entity = NoteBlockEntity::new(BlockPos::new(0, 0, 0));
        entity.load_additional(&nbt);
        assert_eq!(entity.pitch(), 2);
    }
}
