//! The capability object plugins use to reach each other.

use std::fmt;
use std::sync::{Arc, Weak};

use serde_json::Value;
use tracing::debug;

use crate::bridge::{self, Surface};
use crate::catalog::{Catalog, PluginSummary};
use crate::error::{PluginError, PluginResult};
use crate::id::PluginId;
use crate::live::LivePlugins;

/// Lets an active plugin find and call other active plugins.
///
/// One context exists per registry and every plugin gets a clone. Calls
/// reach active plugins only, listing shows every record, and nothing here
/// changes anyone's lifecycle. Once the registry is gone every lookup comes
/// back empty.
///
/// Calls run the target's code on the calling thread.
#[derive(Clone)]
pub struct PluginContext {
    live: Weak<LivePlugins>,
    catalog: Weak<Catalog>,
}

impl PluginContext {
    pub(crate) fn new(live: &Arc<LivePlugins>, catalog: &Arc<Catalog>) -> Self {
        Self {
            live: Arc::downgrade(live),
            catalog: Arc::downgrade(catalog),
        }
    }

    /// A context that sees no plugins.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            live: Weak::new(),
            catalog: Weak::new(),
        }
    }

    /// Every uploaded plugin, active or not, oldest upload first.
    #[must_use]
    pub fn plugins(&self) -> Vec<PluginSummary> {
        self.catalog
            .upgrade()
            .map(|catalog| catalog.snapshot())
            .unwrap_or_default()
    }

    /// Id of the active plugin whose name matches `name`, ignoring case.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<PluginId> {
        self.live.upgrade()?.resolve(name)
    }

    /// Invoke `method` on the active plugin `id` through the unrestricted
    /// surface.
    ///
    /// # Errors
    ///
    /// [`PluginError::NotFound`] when `id` is not active, otherwise whatever
    /// the invocation reports.
    pub fn call(&self, id: PluginId, method: &str, args: &[Value]) -> PluginResult<Value> {
        let lease = self
            .live
            .upgrade()
            .and_then(|live| live.lease(id))
            .ok_or_else(|| PluginError::NotFound(id.to_string()))?;

        debug!(plugin_id = %id, method, arity = args.len(), "Cross-plugin call");
        bridge::invoke(lease.extension(), method, args, Surface::Unrestricted)
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("attached", &(self.live.strong_count() > 0))
            .finish()
    }
}
