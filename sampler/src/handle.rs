//! Owning wrapper for hardware configuration handles

use crate::backend::{Backend, ConfigId};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A configuration created by [`Backend::try_configure`].
///
/// Dropping the handle is the only way a configuration is released, so each
/// configuration is destroyed exactly once. Handles are not `Clone`; share a
/// profile through `Arc` instead.
pub struct ConfigHandle {
    id: ConfigId,
    backend: Arc<dyn Backend>,
}

impl ConfigHandle {
    /// Take ownership of a freshly created configuration
    pub fn new(id: ConfigId, backend: Arc<dyn Backend>) -> Self {
        Self { id, backend }
    }

    pub fn id(&self) -> ConfigId {
        self.id
    }
}

impl Drop for ConfigHandle {
    fn drop(&mut self) {
        trace!("Releasing {}", self.id);
        self.backend.destroy_config(self.id);
    }
}

impl fmt::Debug for ConfigHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConfigHandle").field(&self.id.0).finish()
    }
}
