//! # Cinder Registry
//!
//! Static game data shared by the world engine: block states, item stacks and the legacy
//! block mapping table.
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

pub mod block_state;
pub mod item_stack;
pub mod legacy;

pub use block_state::{BlockState, CARDINAL_DIRECTION, PropertyValue};
pub use item_stack::ItemStack;
pub use legacy::LegacyBlockMapping;

/// Errors raised while building registry tables.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// An entry of the legacy mapping table could not be read.
    #[error("legacy mapping table entry {0} is malformed: {1}")]
    MalformedLegacyTable(usize, String),
}
