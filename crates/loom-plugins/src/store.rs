//! Durable plugin records.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loom_storage::{KvStore, ScopedKvStore};
use serde::{Deserialize, Serialize};

use crate::error::PluginResult;
use crate::id::PluginId;

/// Namespace holding plugin records.
pub const RECORD_NAMESPACE: &str = "system:plugins";

/// What the host remembers about an uploaded plugin.
///
/// `active` is true exactly when a live instance exists for the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRecord {
    /// Assigned at upload.
    pub id: PluginId,
    /// Display name. The plugin's own name once it has been activated.
    pub name: String,
    /// Description. The plugin's own description once it has been activated.
    pub description: String,
    /// Whether the plugin is active.
    pub active: bool,
    /// Stored artifact.
    pub artifact: PathBuf,
    /// Upload time.
    pub uploaded_at: DateTime<Utc>,
}

/// Fields supplied when a record is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPluginRecord {
    /// Initial display name.
    pub name: String,
    /// Initial description.
    pub description: String,
    /// Stored artifact.
    pub artifact: PathBuf,
}

/// Persistence for [`PluginRecord`]s.
#[async_trait]
pub trait PluginStore: Send + Sync {
    /// Create an inactive record with a fresh id.
    async fn create(&self, record: NewPluginRecord) -> PluginResult<PluginRecord>;

    /// The record with `id`.
    async fn find(&self, id: PluginId) -> PluginResult<Option<PluginRecord>>;

    /// Every record, oldest upload first.
    async fn find_all(&self) -> PluginResult<Vec<PluginRecord>>;

    /// Records marked active, oldest upload first.
    async fn find_active(&self) -> PluginResult<Vec<PluginRecord>> {
        let mut records = self.find_all().await?;
        records.retain(|r| r.active);
        Ok(records)
    }

    /// Insert or replace `record`.
    async fn save(&self, record: &PluginRecord) -> PluginResult<()>;

    /// Delete the record with `id`, returning whether it existed.
    async fn delete(&self, id: PluginId) -> PluginResult<bool>;
}

/// [`PluginStore`] over a key-value store, one JSON document per record
/// under [`RECORD_NAMESPACE`].
#[derive(Debug, Clone)]
pub struct KvPluginStore {
    kv: ScopedKvStore,
}

impl KvPluginStore {
    /// Bind to `store`.
    ///
    /// # Errors
    ///
    /// Only if the namespace is rejected by the store.
    pub fn new(store: Arc<dyn KvStore>) -> PluginResult<Self> {
        Ok(Self {
            kv: ScopedKvStore::new(store, RECORD_NAMESPACE)?,
        })
    }
}

#[async_trait]
impl PluginStore for KvPluginStore {
    async fn create(&self, record: NewPluginRecord) -> PluginResult<PluginRecord> {
        let record = PluginRecord {
            id: PluginId::new(),
            name: record.name,
            description: record.description,
            active: false,
            artifact: record.artifact,
            uploaded_at: Utc::now(),
        };
        self.save(&record).await?;
        Ok(record)
    }

    async fn find(&self, id: PluginId) -> PluginResult<Option<PluginRecord>> {
        Ok(self.kv.get_json(&id.to_string()).await?)
    }

    async fn find_all(&self) -> PluginResult<Vec<PluginRecord>> {
        let mut records: Vec<PluginRecord> = self.kv.scan_json().await?;
        records.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn save(&self, record: &PluginRecord) -> PluginResult<()> {
        Ok(self.kv.set_json(&record.id.to_string(), record).await?)
    }

    async fn delete(&self, id: PluginId) -> PluginResult<bool> {
        Ok(self.kv.delete(&id.to_string()).await?)
    }
}

#[cfg(test)]
mod tests {
    use loom_storage::MemoryKvStore;

    use super::*;

    fn store() -> KvPluginStore {
        KvPluginStore::new(Arc::new(MemoryKvStore::new())).unwrap()
    }

    fn new_record(name: &str) -> NewPluginRecord {
        NewPluginRecord {
            name: name.to_owned(),
            description: String::new(),
            artifact: PathBuf::from(format!("/plugins/{name}")),
        }
    }

    #[tokio::test]
    async fn test_create_find_save_delete() {
        let store = store();
        let mut record = store.create(new_record("a")).await.unwrap();
        assert!(!record.active);
        assert_eq!(store.find(record.id).await.unwrap(), Some(record.clone()));

        record.active = true;
        record.name = "Renamed".into();
        store.save(&record).await.unwrap();
        assert_eq!(store.find(record.id).await.unwrap().unwrap().name, "Renamed");
        assert_eq!(store.find_active().await.unwrap(), vec![record.clone()]);

        assert!(store.delete(record.id).await.unwrap());
        assert!(!store.delete(record.id).await.unwrap());
        assert!(store.find(record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_all_oldest_first() {
        let store = store();
        let first = store.create(new_record("first")).await.unwrap();
        let second = store.create(new_record("second")).await.unwrap();

        let all = store.find_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].uploaded_at <= all[1].uploaded_at);
        let ids: Vec<_> = all.iter().map(|r| r.id).collect();
        assert!(ids.contains(&first.id) && ids.contains(&second.id));
        assert!(store.find_active().await.unwrap().is_empty());
    }
}
