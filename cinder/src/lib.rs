//! # Cinder
//!
//! Runs a single world: loads its configuration, preloads the spawn area and ticks it at
//! a fixed rate until shut down.
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    missing_docs,
    clippy::unwrap_used
)]
#![allow(
    clippy::single_call_fn,
    clippy::multiple_inherent_impl,
    clippy::shadow_unrelated,
    clippy::missing_errors_doc,
    clippy::struct_excessive_bools,
    clippy::needless_pass_by_value,
    clippy::cargo_common_metadata
)]

pub mod logger;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context;
use cinder_core::{behavior::BlockBehaviours, config::WorldConfig, world::World};
use cinder_registry::LegacyBlockMapping;
use cinder_utils::ChunkPos;
use tokio::{
    select,
    task::block_in_place,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;

/// Ticks per second.
pub const TICKS_PER_SECOND: u64 = 20;
const TICK_DURATION: Duration = Duration::from_millis(1000 / TICKS_PER_SECOND);
/// Ticks slower than this are logged.
const SLOW_TICK: Duration = Duration::from_millis(100);

/// The server: one world and the loop driving it.
pub struct CinderServer {
    /// The cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
    /// The world.
    pub world: Arc<World>,
    config: WorldConfig,
}

impl CinderServer {
    /// Builds the world described by `config` and loads the chunks around the origin.
    ///
    /// Fails if the storage cannot be opened or any preloaded chunk cannot be loaded.
    pub fn new(config: WorldConfig) -> anyhow::Result<Self> {
        log::info!("Starting Cinder");
        let legacy = LegacyBlockMapping::embedded().context("loading the legacy block table")?;
        log::debug!("Loaded {} legacy block mappings", legacy.len());
        let behaviours = BlockBehaviours::vanilla();

        let storage = config.open_storage()?;
        let world = World::new(
            config.world_settings(),
            storage,
            config.build_generator(),
            Arc::new(legacy),
            Arc::new(behaviours),
        );

        let started = Instant::now();
        world
            .preload(ChunkPos::new(0, 0), config.preload_radius)
            .context("preloading the spawn area")?;
        log::info!(
            "Spawn area ready in {:.2?} ({} chunks loaded)",
            started.elapsed(),
            world.loaded_chunk_count()
        );

        Ok(Self {
            cancel_token: CancellationToken::new(),
            world: Arc::new(world),
            config,
        })
    }

    /// Ticks the world until the cancellation token fires, saving every autosave interval
    /// and once more on the way out.
    pub async fn run(&self) {
        let mut ticks = interval(TICK_DURATION);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut autosave = interval(Duration::from_secs(self.config.autosave_interval_secs));
        autosave.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first autosave tick completes immediately.
        autosave.tick().await;

        log::info!("Ticking at {TICKS_PER_SECOND} TPS");
        loop {
            select! {
                () = self.cancel_token.cancelled() => {
                    break;
                }
                _ = ticks.tick() => {
                    let started = Instant::now();
                    let tick = block_in_place(|| self.world.tick());
                    let elapsed = started.elapsed();
                    if elapsed > SLOW_TICK {
                        log::warn!("Tick {tick} took {elapsed:.2?}");
                    }
                    let drops = self.world.take_drops();
                    if !drops.is_empty() {
                        log::debug!("Tick {tick} dropped {} item stacks", drops.len());
                    }
                }
                _ = autosave.tick() => {
                    let _span = tracing::info_span!("autosave").entered();
                    block_in_place(|| self.world.save_all());
                }
            }
        }

        log::info!("Stopping Cinder");
        let report = block_in_place(|| self.world.save_all());
        if report.failed > 0 {
            log::error!("{} chunks could not be saved on shutdown", report.failed);
        }
    }

    /// Requests a graceful shutdown.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }
}
