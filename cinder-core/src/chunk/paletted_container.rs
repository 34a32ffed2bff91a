//! Bit-packed paletted storage used for block states, liquids and biomes.
//!
//! A container stores `LEN` values. When every value is the same it holds just that value
//! ([`PalettedContainer::Homogeneous`]). Otherwise it keeps a palette of distinct values and
//! an array of palette indices packed into 32-bit words. A word never splits an index, so a
//! width of `b` bits stores `32 / b` indices per word. Widths grow through [`BIT_WIDTHS`]
//! as the palette fills up and only shrink on [`PalettedContainer::compact`].

use std::{fmt::Debug, hash::Hash};

use cinder_registry::BlockState;
use rustc_hash::FxHashMap;

/// Index widths a heterogeneous palette may use, in increasing order.
pub const BIT_WIDTHS: [u8; 8] = [1, 2, 3, 4, 5, 6, 8, 16];

/// Values that can be stored in a [`PalettedContainer`].
pub trait PaletteValue: Clone + Eq + Hash + Debug {}

impl<T: Clone + Eq + Hash + Debug> PaletteValue for T {}

/// Block storage of a single section.
pub type BlockPalette = PalettedContainer<BlockState, 4096>;
/// Biome storage of a single section, one entry per column.
pub type BiomePalette = PalettedContainer<u32, 256>;

/// Returns the smallest width able to index a palette of `len` entries.
#[must_use]
pub fn bits_for_palette_len(len: usize) -> u8 {
    BIT_WIDTHS
        .iter()
        .copied()
        .find(|bits| (1usize << bits) >= len)
        .unwrap_or(16)
}

/// Returns the number of words needed to store `len` indices of width `bits`.
#[must_use]
pub const fn word_count(bits: u8, len: usize) -> usize {
    let per_word = 32 / bits as usize;
    len.div_ceil(per_word)
}

const fn mask(bits: u8) -> u32 {
    (1u32 << bits) - 1
}

/// A palette with more than one distinct value.
#[derive(Debug, Clone)]
pub struct HeterogeneousPalette<V> {
    palette: Vec<V>,
    lookup: FxHashMap<V, u16>,
    bits: u8,
    words: Vec<u32>,
}

impl<V: PaletteValue> HeterogeneousPalette<V> {
    fn with_bits(palette: Vec<V>, bits: u8, len: usize) -> Self {
        let mut lookup = FxHashMap::default();
        for (i, value) in palette.iter().enumerate() {
            lookup.entry(value.clone()).or_insert(i as u16);
        }
        Self {
            palette,
            lookup,
            bits,
            words: vec![0; word_count(bits, len)],
        }
    }

    fn index(&self, i: usize) -> u16 {
        let per_word = 32 / self.bits as usize;
        let word = self.words[i / per_word];
        let shift = (i % per_word) * self.bits as usize;
        ((word >> shift) & mask(self.bits)) as u16
    }

    fn set_index(&mut self, i: usize, index: u16) {
        let per_word = 32 / self.bits as usize;
        let shift = (i % per_word) * self.bits as usize;
        let word = &mut self.words[i / per_word];
        *word = (*word & !(mask(self.bits) << shift)) | (u32::from(index) << shift);
    }

    fn index_for(&mut self, value: V, len: usize) -> u16 {
        if let Some(index) = self.lookup.get(&value) {
            return *index;
        }

        let index = self.palette.len() as u16;
        self.palette.push(value.clone());
        self.lookup.insert(value, index);

        if self.palette.len() > 1 << self.bits {
            self.repack(bits_for_palette_len(self.palette.len()), len);
        }
        index
    }

    fn repack(&mut self, bits: u8, len: usize) {
        let indices: Vec<u16> = (0..len).map(|i| self.index(i)).collect();
        self.bits = bits;
        self.words = vec![0; word_count(bits, len)];
        for (i, index) in indices.into_iter().enumerate() {
            self.set_index(i, index);
        }
    }
}

/// Paletted storage of `LEN` values.
#[derive(Debug, Clone)]
pub enum PalettedContainer<V: PaletteValue, const LEN: usize> {
    /// Every value is the same.
    Homogeneous(V),
    /// At least two distinct values, bit-packed.
    Heterogeneous(Box<HeterogeneousPalette<V>>),
}

impl<V: PaletteValue, const LEN: usize> PalettedContainer<V, LEN> {
    /// The number of values stored.
    pub const VOLUME: usize = LEN;

    /// Creates a container where every value is `value`.
    #[must_use]
    pub fn filled(value: V) -> Self {
        Self::Homogeneous(value)
    }

    /// Rebuilds a container from its persisted parts.
    ///
    /// Returns `None` if the palette is empty, the width is not valid for the palette size,
    /// the word count does not match, or any index points past the palette.
    #[must_use]
    pub fn from_packed(palette: Vec<V>, bits: u8, words: Vec<u32>) -> Option<Self> {
        match palette.len() {
            0 => return None,
            1 => return palette.into_iter().next().map(Self::Homogeneous),
            _ => {}
        }
        if !BIT_WIDTHS.contains(&bits) || (1usize << bits) < palette.len() {
            return None;
        }
        if words.len() != word_count(bits, LEN) {
            return None;
        }

        let mut inner = HeterogeneousPalette::with_bits(palette, bits, LEN);
        inner.words = words;
        if (0..LEN).any(|i| inner.index(i) as usize >= inner.palette.len()) {
            return None;
        }
        Some(Self::Heterogeneous(Box::new(inner)))
    }

    /// Returns the value at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> &V {
        debug_assert!(index < LEN);
        match self {
            Self::Homogeneous(value) => value,
            Self::Heterogeneous(inner) => &inner.palette[inner.index(index) as usize],
        }
    }

    /// Replaces the value at `index`, returning the previous one.
    ///
    /// A palette that has run out of 16-bit indices is compacted before a new entry is
    /// added.
    pub fn set(&mut self, index: usize, value: V) -> V {
        debug_assert!(index < LEN);
        let exhausted = matches!(
            &*self,
            Self::Heterogeneous(inner)
                if inner.palette.len() > usize::from(u16::MAX) && !inner.lookup.contains_key(&value)
        );
        if exhausted {
            self.compact();
        }
        match self {
            Self::Homogeneous(current) => {
                if *current == value {
                    return value;
                }
                let previous = current.clone();
                let mut inner = HeterogeneousPalette::with_bits(vec![previous.clone()], 1, LEN);
                let new_index = inner.index_for(value, LEN);
                inner.set_index(index, new_index);
                *self = Self::Heterogeneous(Box::new(inner));
                previous
            }
            Self::Heterogeneous(inner) => {
                let previous = inner.palette[inner.index(index) as usize].clone();
                let new_index = inner.index_for(value, LEN);
                inner.set_index(index, new_index);
                previous
            }
        }
    }

    /// The palette entries. A homogeneous container has exactly one.
    #[must_use]
    pub fn palette(&self) -> &[V] {
        match self {
            Self::Homogeneous(value) => std::slice::from_ref(value),
            Self::Heterogeneous(inner) => &inner.palette,
        }
    }

    /// The index width in bits, `0` for a homogeneous container.
    #[must_use]
    pub fn bits_per_index(&self) -> u8 {
        match self {
            Self::Homogeneous(_) => 0,
            Self::Heterogeneous(inner) => inner.bits,
        }
    }

    /// The packed index words, empty for a homogeneous container.
    #[must_use]
    pub fn words(&self) -> &[u32] {
        match self {
            Self::Homogeneous(_) => &[],
            Self::Heterogeneous(inner) => &inner.words,
        }
    }

    /// Returns the single value if the container is homogeneous.
    #[must_use]
    pub fn homogeneous_value(&self) -> Option<&V> {
        match self {
            Self::Homogeneous(value) => Some(value),
            Self::Heterogeneous(_) => None,
        }
    }

    /// Returns true if every stored value equals `value`.
    ///
    /// A heterogeneous container may still hold only `value` when other palette entries
    /// became unused; [`PalettedContainer::compact`] resolves that.
    #[must_use]
    pub fn is_all(&self, value: &V) -> bool {
        match self {
            Self::Homogeneous(current) => current == value,
            Self::Heterogeneous(inner) => {
                let Some(index) = inner.lookup.get(value) else {
                    return false;
                };
                (0..LEN).all(|i| inner.index(i) == *index)
            }
        }
    }

    /// Iterates over all stored values in index order.
    pub fn iter(&self) -> impl Iterator<Item = &V> + '_ {
        (0..LEN).map(|i| self.get(i))
    }

    /// Drops unused palette entries and shrinks the index width to the minimum.
    ///
    /// Entries keep the order of their first use. A container left with a single used
    /// value becomes homogeneous.
    pub fn compact(&mut self) {
        let Self::Heterogeneous(inner) = self else {
            return;
        };

        let mut remap: Vec<Option<u16>> = vec![None; inner.palette.len()];
        let mut palette = Vec::new();
        let mut indices = Vec::with_capacity(LEN);
        for i in 0..LEN {
            let old = inner.index(i) as usize;
            let new = *remap[old].get_or_insert_with(|| {
                palette.push(inner.palette[old].clone());
                (palette.len() - 1) as u16
            });
            indices.push(new);
        }

        if palette.len() == 1 {
            if let Some(value) = palette.pop() {
                *self = Self::Homogeneous(value);
            }
            return;
        }

        let bits = bits_for_palette_len(palette.len());
        if palette.len() == inner.palette.len() && bits == inner.bits {
            return;
        }

        let mut compacted = HeterogeneousPalette::with_bits(palette, bits, LEN);
        for (i, index) in indices.into_iter().enumerate() {
            compacted.set_index(i, index);
        }
        **inner = compacted;
    }
}

impl<V: PaletteValue + Default, const LEN: usize> Default for PalettedContainer<V, LEN> {
    fn default() -> Self {
        Self::Homogeneous(V::default())
    }
}
