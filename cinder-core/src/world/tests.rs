use std::{
    fs,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

use cinder_registry::{BlockState, CARDINAL_DIRECTION, ItemStack, LegacyBlockMapping};
use cinder_utils::{BlockPos, ChunkPos, Identifier, locks::SyncMutex};

use super::*;
use crate::{
    behavior::BlockBehaviour,
    block_entity::entities::{ChestBlockEntity, ChestPairing, NoteBlockEntity},
    chunk::{flat_chunk_generator::FlatChunkGenerator, void_chunk_generator::VoidChunkGenerator},
    chunk_saver::{FileStorage, RamOnlyStorage},
    viewer::test_viewer::{RecordingViewer, ViewerEvent},
};

#[derive(Default)]
struct Recorder {
    scheduled: SyncMutex<Vec<(BlockPos, u64)>>,
    random_ticks: AtomicUsize,
}

impl BlockBehaviour for Recorder {
    fn scheduled_update(&self, world: &World, pos: BlockPos, _state: &BlockState) {
        self.scheduled.lock().push((pos, world.current_tick()));
    }

    fn ticks_randomly(&self) -> bool {
        true
    }

    fn random_tick(&self, _world: &World, _pos: BlockPos, _state: &BlockState) {
        self.random_ticks.fetch_add(1, Ordering::Relaxed);
    }
}

fn settings() -> WorldSettings {
    WorldSettings {
        min_y: 0,
        height: 64,
        random_tick_speed: 0,
        ..WorldSettings::default()
    }
}

fn build(settings: WorldSettings, generator: ChunkGeneratorType, behaviours: BlockBehaviours) -> World {
    let legacy = LegacyBlockMapping::embedded().unwrap();
    World::new(
        settings,
        ChunkStorage::RamOnly(RamOnlyStorage::new()),
        generator,
        Arc::new(legacy),
        Arc::new(behaviours),
    )
}

fn world() -> World {
    let world = build(
        settings(),
        ChunkGeneratorType::Void(VoidChunkGenerator),
        BlockBehaviours::vanilla(),
    );
    world.preload(ChunkPos::new(0, 0), 1).unwrap();
    world
}

fn block(name: &'static str) -> BlockState {
    BlockState::new(Identifier::vanilla_static(name))
}

fn chest(facing: &str) -> BlockState {
    block("chest").with_property(CARDINAL_DIRECTION, facing)
}

fn item(name: &'static str, count: i32) -> ItemStack {
    ItemStack::new(Identifier::vanilla_static(name), count)
}

fn pairing(world: &World, pos: BlockPos) -> Option<ChestPairing> {
    world
        .with_block_entity(pos, ChestBlockEntity::pairing)
        .flatten()
}

fn place(world: &World, pos: BlockPos, state: BlockState) {
    assert!(world.set_block(pos, state, SetBlockOptions::default()));
}

fn tick_to(world: &World, tick: u64) {
    while world.current_tick() < tick {
        world.tick();
    }
}

#[test]
fn scheduled_update_fires_on_its_due_tick() {
    let recorder = Arc::new(Recorder::default());
    let mut behaviours = BlockBehaviours::new();
    behaviours.register(Identifier::vanilla_static("clock"), recorder.clone());
    let world = build(
        WorldSettings {
            random_tick_speed: 0,
            ..WorldSettings::default()
        },
        ChunkGeneratorType::Void(VoidChunkGenerator),
        behaviours,
    );
    world.load_chunk(ChunkPos::new(0, 0)).unwrap();

    let pos = BlockPos::new(0, 64, 0);
    place(&world, pos, block("clock"));
    tick_to(&world, 100);
    assert_eq!(world.schedule_update(pos, 5), Some(105));
    assert_eq!(world.pending_update(pos), Some(105));

    tick_to(&world, 104);
    assert!(recorder.scheduled.lock().is_empty());
    world.tick();
    assert_eq!(*recorder.scheduled.lock(), vec![(pos, 105)]);
    assert_eq!(world.pending_update(pos), None);
}

#[test]
fn changed_block_drops_its_scheduled_update() {
    let recorder = Arc::new(Recorder::default());
    let mut behaviours = BlockBehaviours::new();
    behaviours.register(Identifier::vanilla_static("clock"), recorder.clone());
    let world = build(settings(), ChunkGeneratorType::Void(VoidChunkGenerator), behaviours);
    world.load_chunk(ChunkPos::new(0, 0)).unwrap();

    let pos = BlockPos::new(2, 10, 2);
    place(&world, pos, block("clock"));
    world.schedule_update(pos, 3);
    place(&world, pos, block("stone"));
    tick_to(&world, 10);
    assert!(recorder.scheduled.lock().is_empty());
}

#[test]
fn random_ticks_pick_positions_per_section() {
    let recorder = Arc::new(Recorder::default());
    let mut behaviours = BlockBehaviours::new();
    behaviours.register(Identifier::vanilla_static("grass"), recorder.clone());
    let generator = FlatChunkGenerator::new(vec![block("grass"); 16], 0);
    let world = build(
        WorldSettings {
            random_tick_speed: 3,
            ..settings()
        },
        ChunkGeneratorType::Flat(generator),
        behaviours,
    );
    world.load_chunk(ChunkPos::new(0, 0)).unwrap();

    world.tick();
    assert_eq!(recorder.random_ticks.load(Ordering::Relaxed), 3);
}

#[test]
fn unloaded_positions_read_as_air_and_reject_writes() {
    let world = world();
    let far = BlockPos::new(500, 10, 500);
    assert!(!world.is_loaded(far));
    assert!(world.block(far).is_air());
    assert!(!world.set_block(far, block("stone"), SetBlockOptions::default()));
    assert!(!world.set_block(BlockPos::new(0, 64, 0), block("stone"), SetBlockOptions::default()));
}

#[test]
fn neighbours_and_chunk_viewers() {
    let world = world();
    let pos = BlockPos::new(16, 10, 0);
    place(&world, BlockPos::new(15, 10, 0), block("stone"));
    place(&world, BlockPos::new(16, 11, 0), block("dirt"));

    let mut seen = Vec::new();
    world.neighbours(pos, |neighbour, state| {
        if !state.is_air() {
            seen.push((neighbour, state));
        }
    });
    assert_eq!(
        seen,
        vec![
            (BlockPos::new(15, 10, 0), block("stone")),
            (BlockPos::new(16, 11, 0), block("dirt")),
        ]
    );

    let watcher = RecordingViewer::new();
    world.add_chunk_viewer(pos.chunk_pos(), &watcher.as_viewer());
    assert_eq!(world.viewers(pos).len(), 1);
    assert!(world.viewers(BlockPos::new(0, 10, 0)).is_empty());
    assert!(world.remove_chunk_viewer(pos.chunk_pos(), watcher.viewer_id()));
    assert!(!world.remove_chunk_viewer(pos.chunk_pos(), watcher.viewer_id()));
    assert!(world.viewers(pos).is_empty());
}

#[test]
fn breaking_a_chest_drops_its_items() {
    let world = world();
    let pos = BlockPos::new(4, 10, 4);
    place(&world, pos, chest("north"));
    let inventory = world.inventory(pos).unwrap();
    assert_eq!(inventory.size(), 27);
    inventory.set_item(5, item("diamond", 3)).unwrap();

    place(&world, pos, block("air"));
    assert!(world.inventory(pos).is_none());
    let drops = world.take_drops();
    assert_eq!(
        drops,
        vec![ItemDrop {
            pos,
            stack: item("diamond", 3)
        }]
    );
    assert!(world.take_drops().is_empty());
}

#[test]
fn chests_pair_with_lead_items_first() {
    let world = world();
    let (a, b) = (BlockPos::new(0, 10, 0), BlockPos::new(1, 10, 0));
    assert!(world.set_block(a, chest("north"), SetBlockOptions::QUIET));
    assert!(world.set_block(b, chest("north"), SetBlockOptions::QUIET));
    world.inventory(a).unwrap().set_item(0, item("apple", 1)).unwrap();
    world.inventory(b).unwrap().set_item(0, item("bread", 2)).unwrap();

    assert!(world.try_pair(a, b));
    let shared = world.inventory(a).unwrap();
    assert!(Arc::ptr_eq(&shared, &world.inventory(b).unwrap()));
    assert_eq!(shared.size(), 54);
    assert_eq!(shared.item(0).unwrap(), item("apple", 1));
    assert_eq!(shared.item(27).unwrap(), item("bread", 2));
    assert_eq!(pairing(&world, a), Some(ChestPairing { partner: b, lead: true }));
    assert_eq!(pairing(&world, b), Some(ChestPairing { partner: a, lead: false }));

    assert!(!world.try_pair(b, a));
}

#[test]
fn placing_a_chest_pairs_only_matching_neighbours() {
    let world = world();
    let (a, b, c) = (
        BlockPos::new(0, 10, 0),
        BlockPos::new(1, 10, 0),
        BlockPos::new(2, 10, 0),
    );
    place(&world, a, chest("north"));
    place(&world, b, chest("north"));
    assert_eq!(pairing(&world, a).map(|p| p.partner), Some(b));
    assert_eq!(pairing(&world, b).map(|p| p.partner), Some(a));

    place(&world, c, chest("north"));
    assert_eq!(pairing(&world, c), None);

    let (d, e) = (BlockPos::new(5, 10, 5), BlockPos::new(5, 10, 6));
    place(&world, d, chest("north"));
    place(&world, e, chest("north"));
    assert_eq!(pairing(&world, d), None);
    assert_eq!(pairing(&world, e), None);
}

#[test]
fn racing_pairs_produce_one_pair() {
    let world = world();
    let (a, b) = (BlockPos::new(0, 10, 0), BlockPos::new(1, 10, 0));
    assert!(world.set_block(a, chest("east"), SetBlockOptions::QUIET));
    assert!(world.set_block(b, chest("east"), SetBlockOptions::QUIET));
    // East is not along z, so chests facing east pair along z only.
    assert!(!world.try_pair(a, b));

    let b = BlockPos::new(0, 10, 1);
    assert!(world.set_block(b, chest("east"), SetBlockOptions::QUIET));
    let successes = AtomicUsize::new(0);
    thread::scope(|scope| {
        for (x, y) in [(a, b), (b, a), (a, b), (b, a)] {
            let world = &world;
            let successes = &successes;
            scope.spawn(move || {
                if world.try_pair(x, y) {
                    successes.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });
    assert_eq!(successes.load(Ordering::Relaxed), 1);
    assert!(Arc::ptr_eq(
        &world.inventory(a).unwrap(),
        &world.inventory(b).unwrap()
    ));
}

#[test]
fn breaking_one_half_unpairs_the_other() {
    let world = world();
    let (a, b) = (BlockPos::new(0, 10, 0), BlockPos::new(1, 10, 0));
    place(&world, a, chest("north"));
    place(&world, b, chest("north"));
    let shared = world.inventory(a).unwrap();
    shared.set_item(3, item("apple", 4)).unwrap();
    shared.set_item(30, item("bread", 5)).unwrap();

    place(&world, b, block("air"));
    assert_eq!(
        world.take_drops(),
        vec![ItemDrop {
            pos: b,
            stack: item("bread", 5)
        }]
    );
    assert_eq!(pairing(&world, a), None);
    let own = world.inventory(a).unwrap();
    assert_eq!(own.size(), 27);
    assert_eq!(own.item(3).unwrap(), item("apple", 4));
}

#[test]
fn open_and_close_are_broadcast_once() {
    let world = world();
    let pos = BlockPos::new(3, 10, 3);
    place(&world, pos, chest("north"));

    let watcher = RecordingViewer::new();
    world.add_chunk_viewer(pos.chunk_pos(), &watcher.as_viewer());
    let (first, second) = (RecordingViewer::new(), RecordingViewer::new());

    assert!(world.use_block(pos, &first.as_viewer()));
    assert!(world.use_block(pos, &second.as_viewer()));
    assert_eq!(watcher.count_actions(BlockAction::Open), 1);

    assert!(!world.close_container(pos, first.viewer_id()));
    assert!(world.close_container(pos, second.viewer_id()));
    assert_eq!(watcher.count_actions(BlockAction::Close), 1);
}

#[test]
fn replacing_a_block_entity_drops_and_closes_the_old_one() {
    let world = world();
    let pos = BlockPos::new(4, 10, 4);
    place(&world, pos, chest("north"));
    let old = world.inventory(pos).unwrap();
    old.set_item(0, item("diamond", 3)).unwrap();
    let watcher = RecordingViewer::new();
    world.add_chunk_viewer(pos.chunk_pos(), &watcher.as_viewer());
    let user = RecordingViewer::new();
    world.open_container(pos, &user.as_viewer()).unwrap();

    let fresh = Box::new(ChestBlockEntity::new(pos, world.viewer_registry()));
    assert!(world.set_block_with_entity(pos, chest("north"), fresh, SetBlockOptions::default()));

    assert_eq!(
        world.take_drops(),
        vec![ItemDrop {
            pos,
            stack: item("diamond", 3)
        }]
    );
    assert_eq!(watcher.count_actions(BlockAction::Close), 1);
    assert!(!world.viewer_registry().is_registered(old.id()));
    let new = world.inventory(pos).unwrap();
    assert!(!Arc::ptr_eq(&old, &new));
    assert!(new.is_empty());
}

#[test]
fn pairing_two_open_chests_opens_both_halves_together() {
    let world = world();
    let (a, b) = (BlockPos::new(0, 10, 0), BlockPos::new(1, 10, 0));
    assert!(world.set_block(a, chest("north"), SetBlockOptions::QUIET));
    assert!(world.set_block(b, chest("north"), SetBlockOptions::QUIET));
    let watcher = RecordingViewer::new();
    world.add_chunk_viewer(a.chunk_pos(), &watcher.as_viewer());
    let (first, second) = (RecordingViewer::new(), RecordingViewer::new());
    world.open_container(a, &first.as_viewer()).unwrap();
    world.open_container(b, &second.as_viewer()).unwrap();
    watcher.clear();

    assert!(world.try_pair(a, b));
    assert_eq!(
        watcher.events(),
        vec![
            ViewerEvent::BlockAction(a, BlockAction::Close),
            ViewerEvent::BlockAction(b, BlockAction::Close),
            ViewerEvent::BlockAction(a, BlockAction::Open),
            ViewerEvent::BlockAction(b, BlockAction::Open),
        ]
    );
    let shared = world.inventory(a).unwrap();
    assert_eq!(world.viewer_registry().viewer_count(shared.id()), 2);
}

#[test]
fn pairing_moves_viewers_onto_the_shared_inventory() {
    let world = world();
    let (a, b) = (BlockPos::new(0, 10, 0), BlockPos::new(1, 10, 0));
    assert!(world.set_block(a, chest("north"), SetBlockOptions::QUIET));
    assert!(world.set_block(b, chest("north"), SetBlockOptions::QUIET));
    let user = RecordingViewer::new();
    let single = world.open_container(a, &user.as_viewer()).unwrap();

    assert!(world.try_pair(a, b));
    let shared = world.inventory(a).unwrap();
    assert!(!Arc::ptr_eq(&single, &shared));
    assert_eq!(world.viewer_registry().viewer_count(shared.id()), 1);

    user.clear();
    shared.set_item(30, item("bread", 2)).unwrap();
    single.set_item(0, item("apple", 1)).unwrap();
    assert_eq!(user.slot_changes(), vec![(30, item("bread", 2))]);
}

#[test]
fn dropping_a_session_closes_its_containers() {
    let world = world();
    let pos = BlockPos::new(3, 10, 3);
    place(&world, pos, chest("north"));
    let watcher = RecordingViewer::new();
    world.add_chunk_viewer(pos.chunk_pos(), &watcher.as_viewer());

    let session = RecordingViewer::new().as_viewer();
    let guard = world.register_session(&session);
    world.add_chunk_viewer(pos.chunk_pos(), &session);
    let inventory = world.open_container(pos, &session).unwrap();
    assert_eq!(world.session_count(), 1);
    assert_eq!(world.viewer_registry().viewer_count(inventory.id()), 1);

    drop(guard);
    assert_eq!(world.session_count(), 0);
    assert_eq!(world.viewer_registry().viewer_count(inventory.id()), 0);
    assert_eq!(watcher.count_actions(BlockAction::Close), 1);
    assert_eq!(world.viewers(pos).len(), 1);
}

#[test]
fn unloading_keeps_updates_and_split_chest_halves() {
    let world = world();
    let (a, b) = (BlockPos::new(15, 10, 0), BlockPos::new(16, 10, 0));
    place(&world, a, chest("north"));
    place(&world, b, chest("north"));
    let shared = world.inventory(a).unwrap();
    assert_eq!(shared.size(), 54);
    shared.set_item(0, item("apple", 1)).unwrap();
    shared.set_item(27, item("bread", 2)).unwrap();

    let water = BlockPos::new(3, 10, 3);
    place(&world, water, block("water"));
    assert_eq!(world.pending_update(water), Some(5));

    assert!(world.unload_chunk(ChunkPos::new(0, 0)).unwrap());
    assert!(!world.unload_chunk(ChunkPos::new(0, 0)).unwrap());
    assert_eq!(world.pending_update(water), None);
    assert_eq!(world.pending_save_count(), 0);
    assert!(matches!(&world.storage, ChunkStorage::RamOnly(ram) if ram.len() == 1));

    let survivor = world.inventory(b).unwrap();
    assert_eq!(survivor.size(), 27);
    assert_eq!(survivor.item(0).unwrap(), item("bread", 2));
    assert_eq!(pairing(&world, b), Some(ChestPairing { partner: a, lead: false }));

    world.load_chunk(ChunkPos::new(0, 0)).unwrap();
    assert_eq!(world.block(water), block("water"));
    assert_eq!(world.pending_update(water), Some(5));
    let relinked = world.inventory(a).unwrap();
    assert!(Arc::ptr_eq(&relinked, &world.inventory(b).unwrap()));
    assert_eq!(relinked.item(0).unwrap(), item("apple", 1));
    assert_eq!(relinked.item(27).unwrap(), item("bread", 2));
}

#[test]
fn save_all_writes_only_changed_chunks() {
    let world = world();
    let first = world.save_all();
    assert_eq!(first.saved, 0);
    assert_eq!(first.skipped, 9);

    let pos = BlockPos::new(1, 10, 1);
    place(&world, pos, chest("south"));
    let report = world.save_all();
    assert_eq!((report.saved, report.failed), (1, 0));
    assert_eq!(world.save_all().saved, 0);

    world.inventory(pos).unwrap().set_item(0, item("apple", 1)).unwrap();
    assert_eq!(world.save_all().saved, 1);
}

#[test]
fn waterloggable_blocks_keep_water() {
    let world = world();
    let pos = BlockPos::new(6, 10, 6);
    place(&world, pos, block("water"));
    place(&world, pos, block("oak_stairs"));
    assert_eq!(world.liquid(pos), Some(block("water")));

    place(&world, pos, block("stone"));
    assert_eq!(world.liquid(pos), None);

    let furnace = BlockPos::new(7, 10, 6);
    place(&world, furnace, block("water"));
    place(&world, furnace, block("furnace"));
    assert_eq!(world.liquid(furnace), None);

    let hopper = BlockPos::new(8, 10, 6);
    place(&world, hopper, block("water"));
    place(&world, hopper, block("hopper"));
    assert_eq!(world.liquid(hopper), Some(block("water")));
}

#[test]
fn water_falls_after_its_delay() {
    let world = world();
    let pos = BlockPos::new(2, 10, 2);
    let below = BlockPos::new(2, 9, 2);
    place(&world, pos, block("water"));

    tick_to(&world, 4);
    assert!(world.block(below).is_air());
    world.tick();
    assert_eq!(world.block(below), block("water"));
    assert_eq!(world.pending_update(below), Some(10));
}

#[test]
fn note_block_cycles_its_pitch() {
    let world = world();
    let pos = BlockPos::new(0, 10, 0);
    place(&world, pos, block("noteblock"));
    let user = RecordingViewer::new().as_viewer();

    assert!(world.use_block(pos, &user));
    assert!(world.use_block(pos, &user));
    assert_eq!(world.with_block_entity(pos, NoteBlockEntity::pitch), Some(2));
}

#[test]
fn failed_saves_are_counted_once_and_retried_later() {
    let dir = tempfile::tempdir().unwrap();
    let world = World::new(
        settings(),
        ChunkStorage::File(FileStorage::open(dir.path()).unwrap()),
        ChunkGeneratorType::Void(VoidChunkGenerator),
        Arc::new(LegacyBlockMapping::embedded().unwrap()),
        Arc::new(BlockBehaviours::vanilla()),
    );
    world.load_chunk(ChunkPos::new(0, 0)).unwrap();
    place(&world, BlockPos::new(1, 10, 1), block("stone"));

    let blocker = dir.path().join("overworld");
    fs::write(&blocker, b"not a directory").unwrap();
    let report = world.save_all();
    assert_eq!((report.saved, report.failed), (0, 1));
    assert_eq!(world.pending_save_count(), 1);

    fs::remove_file(&blocker).unwrap();
    let report = world.save_all();
    assert_eq!((report.saved, report.failed), (1, 0));
    assert_eq!(world.pending_save_count(), 0);
}
