//! This module contains the inventory system.

mod container;
mod shared;
mod simple_container;

use std::{
    fmt::{self, Display},
    sync::atomic::{AtomicU64, Ordering},
};

pub use container::Container;
pub use shared::Inventory;
pub use simple_container::SimpleContainer;

/// The number of slots of a single chest.
pub const SINGLE_CHEST_SIZE: usize = 27;
/// The number of slots of a paired chest.
pub const DOUBLE_CHEST_SIZE: usize = SINGLE_CHEST_SIZE * 2;

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one live inventory for viewer bookkeeping.
///
/// Ids are never reused within a process, so a stale id can never address a newer
/// inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContainerId(u64);

impl ContainerId {
    /// Allocates a fresh id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
