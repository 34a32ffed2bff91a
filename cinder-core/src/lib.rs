//! # Cinder Core
//!
//! The block-world engine: chunk storage and persistence, block entities and their
//! inventories, scheduled and random block updates, block behaviours and the world that
//! ties them together.
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

pub mod behavior;
pub mod block_entity;
pub mod chunk;
pub mod chunk_saver;
pub mod config;
pub mod error;
pub mod inventory;
pub mod ticks;
pub mod viewer;
pub mod world;
