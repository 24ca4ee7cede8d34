//! The live registry: plugin id to loaded instance.
//!
//! Lookups clone an `Arc` under the read lock and release it before any
//! plugin code runs. Insert and remove take the write lock and never run
//! plugin code under it. A caller holding a [`Lease`] keeps the instance
//! alive after removal; [`Draining::wait`] resolves once the last lease is
//! gone, so `on_deactivate` never overlaps a call.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Notify;

use crate::id::PluginId;
use crate::loader::LoadedPlugin;

struct LiveEntry {
    plugin: LoadedPlugin,
    released: Arc<Notify>,
}

/// Synchronized map of active plugins.
#[derive(Default)]
pub(crate) struct LivePlugins {
    entries: RwLock<HashMap<PluginId, Arc<LiveEntry>>>,
}

impl LivePlugins {
    pub(crate) fn insert(&self, id: PluginId, plugin: LoadedPlugin) {
        let entry = Arc::new(LiveEntry {
            plugin,
            released: Arc::new(Notify::new()),
        });
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, entry);
    }

    /// Remove an instance. New leases can no longer be taken.
    pub(crate) fn remove(&self, id: PluginId) -> Option<Draining> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .map(|entry| Draining { entry })
    }

    /// Remove every instance, ordered by id.
    pub(crate) fn remove_all(&self) -> Vec<(PluginId, Draining)> {
        let mut drained: Vec<_> = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(id, entry)| (id, Draining { entry }))
            .collect();
        drained.sort_by_key(|(id, _)| *id);
        drained
    }

    pub(crate) fn lease(&self, id: PluginId) -> Option<Lease> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|entry| Lease {
                entry: Arc::clone(entry),
                _release: ReleaseSignal(Arc::clone(&entry.released)),
            })
    }

    pub(crate) fn contains(&self, id: PluginId) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// Ids of every active plugin, ordered.
    pub(crate) fn ids(&self) -> Vec<PluginId> {
        let mut ids: Vec<_> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort();
        ids
    }

    /// Case-insensitive lookup by self-reported name. The smallest id wins
    /// when several active plugins share a name.
    pub(crate) fn resolve(&self, name: &str) -> Option<PluginId> {
        let wanted = name.to_lowercase();
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, entry)| entry.plugin.extension().name().to_lowercase() == wanted)
            .map(|(id, _)| *id)
            .min()
    }
}

/// Shared access to an active instance for the duration of one call.
pub(crate) struct Lease {
    // Dropped before `_release` signals.
    entry: Arc<LiveEntry>,
    _release: ReleaseSignal,
}

impl Deref for Lease {
    type Target = LoadedPlugin;

    fn deref(&self) -> &LoadedPlugin {
        &self.entry.plugin
    }
}

struct ReleaseSignal(Arc<Notify>);

impl Drop for ReleaseSignal {
    fn drop(&mut self) {
        self.0.notify_waiters();
    }
}

/// A removed instance that may still be serving calls.
pub(crate) struct Draining {
    entry: Arc<LiveEntry>,
}

impl Draining {
    /// Wait for outstanding leases to be released and take the instance.
    pub(crate) async fn wait(self) -> LoadedPlugin {
        let released = Arc::clone(&self.entry.released);
        let mut entry = self.entry;
        loop {
            let notified = released.notified();
            tokio::pin!(notified);
            // Register before checking, so a release in between is not missed.
            notified.as_mut().enable();
            match Arc::try_unwrap(entry) {
                Ok(last) => return last.plugin,
                Err(shared) => {
                    entry = shared;
                    notified.await;
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::contract::{Extension, ExtensionError};
    use crate::loader::CodeSpace;
    use crate::method::MethodTable;

    struct Named(&'static str, MethodTable);

    impl Extension for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            ""
        }

        fn execute(&self, input: &str) -> Result<String, ExtensionError> {
            Ok(input.to_owned())
        }

        fn methods(&self) -> &MethodTable {
            &self.1
        }
    }

    fn loaded(name: &'static str) -> LoadedPlugin {
        LoadedPlugin::new(
            Box::new(Named(name, MethodTable::empty())),
            CodeSpace::new("/tmp/a", "a", "00"),
        )
    }

    #[test]
    fn test_resolve_case_insensitive_smallest_id() {
        let live = LivePlugins::default();
        let a = PluginId::new();
        let b = PluginId::new();
        live.insert(a, loaded("String Processor"));
        live.insert(b, loaded("string PROCESSOR"));
        live.insert(PluginId::new(), loaded("Other"));

        assert_eq!(live.resolve("STRING processor"), Some(a.min(b)));
        assert_eq!(live.resolve("missing"), None);
        assert_eq!(live.ids().len(), 3);
    }

    #[test]
    fn test_removed_plugin_cannot_be_leased() {
        let live = LivePlugins::default();
        let id = PluginId::new();
        live.insert(id, loaded("A"));
        assert!(live.contains(id));
        assert!(live.remove(id).is_some());
        assert!(live.lease(id).is_none());
        assert!(live.remove(id).is_none());
    }

    #[tokio::test]
    async fn test_drain_waits_for_leases() {
        let live = LivePlugins::default();
        let id = PluginId::new();
        live.insert(id, loaded("A"));

        let lease = live.lease(id).unwrap();
        let draining = live.remove(id).unwrap();
        let waiter = tokio::spawn(draining.wait());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        assert_eq!(lease.extension().name(), "A");

        drop(lease);
        let plugin = waiter.await.unwrap();
        assert_eq!(plugin.extension().name(), "A");
    }

    #[tokio::test]
    async fn test_drain_without_leases_is_immediate() {
        let live = LivePlugins::default();
        let id = PluginId::new();
        live.insert(id, loaded("A"));
        let plugin = live.remove(id).unwrap().wait().await;
        assert_eq!(plugin.space().unit, "a");
    }
}
