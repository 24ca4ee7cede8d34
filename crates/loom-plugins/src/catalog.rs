//! Read-only view of every plugin record, for plugins.
//!
//! The registry mirrors each record change here under its lifecycle lock,
//! so plugin code can list plugins synchronously without touching the
//! record store.

use std::sync::{PoisonError, RwLock};

use loom_abi::PluginInfo;
use serde::Serialize;

use crate::id::PluginId;
use crate::store::PluginRecord;

/// A plugin as other plugins see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginSummary {
    /// Plugin id.
    pub id: PluginId,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Whether the plugin is active.
    pub active: bool,
}

impl From<&PluginRecord> for PluginSummary {
    fn from(record: &PluginRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            description: record.description.clone(),
            active: record.active,
        }
    }
}

impl PluginSummary {
    /// The guest-facing form.
    #[must_use]
    pub fn to_wire(&self) -> PluginInfo {
        PluginInfo {
            id: self.id.to_string(),
            name: self.name.clone(),
            description: self.description.clone(),
            active: self.active,
        }
    }
}

/// Summaries in upload order.
#[derive(Default)]
pub(crate) struct Catalog {
    entries: RwLock<Vec<PluginSummary>>,
}

impl Catalog {
    /// Replace everything with `records`, which must be in upload order.
    pub(crate) fn replace(&self, records: &[PluginRecord]) {
        *self.entries.write().unwrap_or_else(PoisonError::into_inner) =
            records.iter().map(PluginSummary::from).collect();
    }

    /// Update the entry for `record`, appending it if new.
    pub(crate) fn upsert(&self, record: &PluginRecord) {
        let summary = PluginSummary::from(record);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.iter_mut().find(|e| e.id == record.id) {
            Some(existing) => *existing = summary,
            None => entries.push(summary),
        }
    }

    pub(crate) fn remove(&self, id: PluginId) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|e| e.id != id);
    }

    pub(crate) fn snapshot(&self) -> Vec<PluginSummary> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::Utc;

    use super::*;

    fn record(name: &str, active: bool) -> PluginRecord {
        PluginRecord {
            id: PluginId::new(),
            name: name.to_owned(),
            description: String::new(),
            active,
            artifact: PathBuf::from("/plugins/a"),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn test_upsert_keeps_upload_order() {
        let catalog = Catalog::default();
        let mut first = record("first", false);
        let second = record("second", true);
        catalog.upsert(&first);
        catalog.upsert(&second);

        first.name = "First Plugin".into();
        first.active = true;
        catalog.upsert(&first);

        let names: Vec<_> = catalog.snapshot().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["First Plugin", "second"]);
        assert!(catalog.snapshot().iter().all(|s| s.active));

        catalog.remove(first.id);
        assert_eq!(catalog.snapshot().len(), 1);
        assert_eq!(catalog.snapshot()[0].id, second.id);
    }

    #[test]
    fn test_replace_and_wire_form() {
        let catalog = Catalog::default();
        catalog.upsert(&record("stale", false));
        let fresh = record("Echo Plugin", true);
        catalog.replace(std::slice::from_ref(&fresh));

        let wire: Vec<PluginInfo> = catalog.snapshot().iter().map(PluginSummary::to_wire).collect();
        assert_eq!(
            wire,
            vec![PluginInfo {
                id: fresh.id.to_string(),
                name: "Echo Plugin".into(),
                description: String::new(),
                active: true,
            }]
        );
    }
}
