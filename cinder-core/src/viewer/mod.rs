//! Viewers: sessions that observe containers and the blocks around them.
//!
//! A viewer is owned by the session layer. The world only keeps [`ViewerHandle`]s, which
//! hold a weak reference, so a torn-down session can never be kept alive or called into
//! after its owner dropped it.

mod registry;

use std::sync::{Arc, Weak};

use cinder_registry::ItemStack;
use cinder_utils::{BlockPos, ViewerId};

pub use registry::{AddViewerError, ViewerRegistry};

/// A visual block event shown to nearby viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockAction {
    /// A container started being viewed.
    Open,
    /// A container stopped being viewed.
    Close,
}

/// Sink for events about containers and blocks.
///
/// Implementations are called from world threads and must not block on the world.
pub trait Viewer: Send + Sync {
    /// Stable identity of this viewer.
    fn viewer_id(&self) -> ViewerId;

    /// A slot of a container this viewer has open changed.
    fn view_slot_change(&self, slot: usize, stack: &ItemStack);

    /// A block in view played an action.
    fn view_block_action(&self, pos: BlockPos, action: BlockAction);
}

/// A non-owning reference to a viewer.
#[derive(Clone)]
pub struct ViewerHandle {
    id: ViewerId,
    sink: Weak<dyn Viewer>,
}

impl ViewerHandle {
    /// Creates a handle for a live viewer.
    #[must_use]
    pub fn new(viewer: &Arc<dyn Viewer>) -> Self {
        Self {
            id: viewer.viewer_id(),
            sink: Arc::downgrade(viewer),
        }
    }

    /// The viewer's id.
    #[must_use]
    pub fn id(&self) -> ViewerId {
        self.id
    }

    /// Returns the viewer if its session is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Arc<dyn Viewer>> {
        self.sink.upgrade()
    }

    /// Returns true once the session has been dropped.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.sink.strong_count() == 0
    }
}

impl std::fmt::Debug for ViewerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerHandle")
            .field("id", &self.id)
            .field("alive", &!self.is_dead())
            .finish()
    }
}
