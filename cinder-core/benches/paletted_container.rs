#![allow(missing_docs)]
//! Benchmarks for palette writes and compaction.

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use cinder_core::chunk::{paletted_container::BlockPalette, section::ChunkSection};
use cinder_registry::BlockState;
use cinder_utils::Identifier;

const SECTION_VOLUME: usize = 4096;

fn distinct_states(count: usize) -> Vec<BlockState> {
    (0..count)
        .map(|i| BlockState::new(Identifier::vanilla(format!("block_{i}"))))
        .collect()
}

fn bench_palette_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("palette_writes");

    // Palette sizes that land on different bit widths.
    for distinct in [1, 4, 16, 64, 300] {
        let states = distinct_states(distinct);
        group.bench_with_input(BenchmarkId::new("fill", distinct), &states, |b, states| {
            b.iter(|| {
                let mut palette = BlockPalette::filled(BlockState::air());
                for index in 0..SECTION_VOLUME {
                    palette.set(index, states[index % states.len()].clone());
                }
                black_box(palette.bits_per_index())
            });
        });
    }
    group.finish();
}

fn bench_section_compact(c: &mut Criterion) {
    let states = distinct_states(64);
    c.bench_function("section_compact_after_overwrite", |b| {
        b.iter_batched(
            || {
                let mut section = ChunkSection::new_empty();
                for (i, state) in states.iter().enumerate() {
                    section.set_block(i % 16, (i / 16) % 16, 0, state.clone());
                }
                for x in 0..16 {
                    section.set_block(x, 0, 0, BlockState::air());
                }
                section
            },
            |mut section| {
                section.compact();
                black_box(section)
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_palette_writes, bench_section_compact);
criterion_main!(benches);
