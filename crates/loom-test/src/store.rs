//! A record store with injectable save failures.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use loom_plugins::{
    KvPluginStore, NewPluginRecord, PluginError, PluginId, PluginRecord, PluginResult, PluginStore,
};

/// A [`KvPluginStore`] whose `save` can be switched to fail.
///
/// `create` is unaffected so uploads keep working.
#[derive(Debug, Clone)]
pub struct FlakyStore {
    inner: KvPluginStore,
    fail_saves: Arc<AtomicBool>,
}

impl FlakyStore {
    /// Wrap `inner`. Saves succeed until [`fail_saves`](Self::fail_saves).
    #[must_use]
    pub fn new(inner: KvPluginStore) -> Self {
        Self {
            inner,
            fail_saves: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every later `save` fail (`true`) or succeed again (`false`).
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PluginStore for FlakyStore {
    async fn create(&self, record: NewPluginRecord) -> PluginResult<PluginRecord> {
        self.inner.create(record).await
    }

    async fn find(&self, id: PluginId) -> PluginResult<Option<PluginRecord>> {
        self.inner.find(id).await
    }

    async fn find_all(&self) -> PluginResult<Vec<PluginRecord>> {
        self.inner.find_all().await
    }

    async fn save(&self, record: &PluginRecord) -> PluginResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PluginError::Storage(format!(
                "save of {} rejected by test store",
                record.id
            )));
        }
        self.inner.save(record).await
    }

    async fn delete(&self, id: PluginId) -> PluginResult<bool> {
        self.inner.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use loom_storage::MemoryKvStore;

    use super::*;

    #[tokio::test]
    async fn test_saves_fail_on_demand() {
        let inner = KvPluginStore::new(Arc::new(MemoryKvStore::new())).unwrap();
        let store = FlakyStore::new(inner);
        let mut record = store
            .create(NewPluginRecord {
                name: "a".into(),
                description: String::new(),
                artifact: "/plugins/a".into(),
            })
            .await
            .unwrap();

        store.fail_saves(true);
        record.active = true;
        assert!(matches!(store.save(&record).await, Err(PluginError::Storage(_))));
        assert!(!store.find(record.id).await.unwrap().unwrap().active);

        store.fail_saves(false);
        store.save(&record).await.unwrap();
        assert!(store.find(record.id).await.unwrap().unwrap().active);
    }
}
