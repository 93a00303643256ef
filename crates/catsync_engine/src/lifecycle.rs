//! Scoped acquisition of the source and target connections.

use crate::config::ConnectionConfiguration;
use crate::error::SyncResult;
use std::sync::Arc;
use tracing::debug;

/// Opens and closes the system connections of a run.
pub trait ConfigLifecycle: Send + Sync {
    /// Opens the connections. Either side is absent for runs that do not use it.
    fn init_config(
        &self,
        source: Option<&ConnectionConfiguration>,
        target: Option<&ConnectionConfiguration>,
    ) -> SyncResult<()>;

    /// Closes the connections. Must tolerate a failed or partial `init_config`.
    fn destroy_config(&self);
}

/// Holds the connections of a run open; closes them when dropped.
#[must_use = "connections are closed when the guard is dropped"]
pub struct ConfigGuard {
    lifecycle: Arc<dyn ConfigLifecycle>,
}

impl ConfigGuard {
    /// Opens the connections. If opening fails they are closed again before
    /// the error is returned.
    pub fn acquire(
        lifecycle: Arc<dyn ConfigLifecycle>,
        source: Option<&ConnectionConfiguration>,
        target: Option<&ConnectionConfiguration>,
    ) -> SyncResult<Self> {
        let guard = Self { lifecycle };
        guard.lifecycle.init_config(source, target)?;
        Ok(guard)
    }
}

impl Drop for ConfigGuard {
    fn drop(&mut self) {
        self.lifecycle.destroy_config();
        debug!("closed system connections");
    }
}
