//! # Cinder Utils
//!
//! Shared position, direction and lock types used across the cinder crates.
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

pub mod direction;
pub mod locks;
pub mod math;
pub mod types;

pub use direction::{Direction, Facing};
pub use types::{BlockPos, ChunkPos, Identifier, ViewerId};
