//! Sessions attached to a world.

use std::sync::Arc;

use cinder_utils::ViewerId;

use super::World;
use crate::viewer::{Viewer, ViewerHandle};

/// Keeps a session attached to a world.
///
/// Dropping the guard detaches the session: it stops watching every chunk and every
/// container it had open is closed for it.
#[must_use = "the session is detached as soon as the guard is dropped"]
pub struct SessionGuard<'a> {
    world: &'a World,
    id: ViewerId,
}

impl SessionGuard<'_> {
    /// The session's viewer id.
    #[must_use]
    pub fn id(&self) -> ViewerId {
        self.id
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.world.remove_session(self.id);
    }
}

impl World {
    /// Attaches a session to the world.
    pub fn register_session(&self, viewer: &Arc<dyn Viewer>) -> SessionGuard<'_> {
        let id = viewer.viewer_id();
        if self.sessions.insert_sync(id, ViewerHandle::new(viewer)).is_err() {
            log::warn!("Session {} was registered twice", id.0);
        } else {
            log::debug!("Session {} attached", id.0);
        }
        SessionGuard { world: self, id }
    }

    /// The number of attached sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Detaches a session: removes it from every chunk's viewers and closes every container
    /// it had open.
    pub fn remove_session(&self, id: ViewerId) {
        self.sessions.remove_sync(&id);
        {
            let mut chunk_viewers = self.chunk_viewers.write();
            chunk_viewers.retain(|_, viewers| {
                viewers.remove(&id);
                !viewers.is_empty()
            });
        }
        let closed = self
            .viewers
            .remove_viewer_everywhere(id, |positions, action| {
                self.broadcast_action(positions, action);
            });
        log::debug!("Session {} detached, closed {closed} containers", id.0);
    }
}
