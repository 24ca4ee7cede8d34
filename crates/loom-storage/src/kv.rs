//! Key-value store trait and backends.
//!
//! Keys live inside namespaces. The host keeps plugin records under
//! `system:plugins`; other namespaces are free for future use. A namespace
//! never sees keys from another one.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{StorageError, StorageResult};

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Namespaces must be non-empty and free of the null separator byte.
fn validate_namespace(namespace: &str) -> StorageResult<()> {
    if namespace.is_empty() {
        return Err(StorageError::InvalidKey(
            "namespace must not be empty".into(),
        ));
    }
    if namespace.contains('\0') {
        return Err(StorageError::InvalidKey(
            "namespace must not contain null bytes".into(),
        ));
    }
    Ok(())
}

/// Keys follow the same rules as namespaces.
fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key must not be empty".into()));
    }
    if key.contains('\0') {
        return Err(StorageError::InvalidKey(
            "key must not contain null bytes".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Namespaced byte-level storage.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value. `None` if the key does not exist.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Set a value, overwriting any existing one.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Delete a key. Returns `true` if it existed.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// All entries of a namespace, ordered by key.
    async fn scan(&self, namespace: &str) -> StorageResult<Vec<(String, Vec<u8>)>>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// In-memory store. Contents are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    data: RwLock<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(e: &std::sync::PoisonError<T>) -> StorageError {
    StorageError::Internal(e.to_string())
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let data = self.data.read().map_err(|ref e| poisoned(e))?;
        Ok(data.get(namespace).and_then(|ns| ns.get(key)).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let mut data = self.data.write().map_err(|ref e| poisoned(e))?;
        data.entry(namespace.to_owned())
            .or_default()
            .insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let mut data = self.data.write().map_err(|ref e| poisoned(e))?;
        Ok(data
            .get_mut(namespace)
            .is_some_and(|ns| ns.remove(key).is_some()))
    }

    async fn scan(&self, namespace: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let data = self.data.read().map_err(|ref e| poisoned(e))?;
        Ok(data
            .get(namespace)
            .map(|ns| ns.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// SurrealKV implementation (behind `kv` feature)
// ---------------------------------------------------------------------------

/// `"{namespace}\0{key}"` as bytes.
#[cfg(feature = "kv")]
fn composite_key(namespace: &str, key: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(namespace.len().saturating_add(key.len()).saturating_add(1));
    buf.extend_from_slice(namespace.as_bytes());
    buf.push(0);
    buf.extend_from_slice(key.as_bytes());
    buf
}

/// `["{namespace}\0", "{namespace}\x01")` covers exactly one namespace.
#[cfg(feature = "kv")]
fn namespace_range(namespace: &str) -> (Vec<u8>, Vec<u8>) {
    let mut start = namespace.as_bytes().to_vec();
    let mut end = start.clone();
    start.push(0);
    end.push(1);
    (start, end)
}

/// Persistent store backed by `SurrealKV`.
///
/// Every operation runs in its own transaction.
#[cfg(feature = "kv")]
pub struct SurrealKvStore {
    tree: surrealkv::Tree,
}

#[cfg(feature = "kv")]
impl std::fmt::Debug for SurrealKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealKvStore").finish_non_exhaustive()
    }
}

#[cfg(feature = "kv")]
impl SurrealKvStore {
    /// Open (or create) a store in `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the store cannot be opened.
    pub fn open(path: impl AsRef<std::path::Path>) -> StorageResult<Self> {
        let tree = surrealkv::TreeBuilder::new()
            .with_path(path.as_ref().to_path_buf())
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        tracing::debug!(path = %path.as_ref().display(), "opened surrealkv store");
        Ok(Self { tree })
    }

    /// Flush pending writes and close the store.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the flush fails.
    pub async fn close(&self) -> StorageResult<()> {
        self.tree
            .close()
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))
    }
}

#[cfg(feature = "kv")]
fn map_kv_err(e: &surrealkv::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

#[cfg(feature = "kv")]
#[async_trait]
impl KvStore for SurrealKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let tx = self
            .tree
            .begin_with_mode(surrealkv::Mode::ReadOnly)
            .map_err(|ref e| map_kv_err(e))?;
        tx.get(&composite_key(namespace, key))
            .map_err(|ref e| map_kv_err(e))
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let mut tx = self.tree.begin().map_err(|ref e| map_kv_err(e))?;
        tx.set(&composite_key(namespace, key), &value)
            .map_err(|ref e| map_kv_err(e))?;
        tx.commit().await.map_err(|ref e| map_kv_err(e))
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let ck = composite_key(namespace, key);
        let mut tx = self.tree.begin().map_err(|ref e| map_kv_err(e))?;
        let existed = tx.get(&ck).map_err(|ref e| map_kv_err(e))?.is_some();
        if existed {
            tx.delete(&ck).map_err(|ref e| map_kv_err(e))?;
            tx.commit().await.map_err(|ref e| map_kv_err(e))?;
        }
        Ok(existed)
    }

    async fn scan(&self, namespace: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        validate_namespace(namespace)?;
        let (start, end) = namespace_range(namespace);
        let prefix_len = start.len();

        let tx = self
            .tree
            .begin_with_mode(surrealkv::Mode::ReadOnly)
            .map_err(|ref e| map_kv_err(e))?;

        // Keys first; the iterator borrows the transaction.
        let raw_keys = {
            let mut iter = tx.range(&start, &end).map_err(|ref e| map_kv_err(e))?;
            iter.seek_first().map_err(|ref e| map_kv_err(e))?;
            let mut keys = Vec::new();
            while iter.valid() {
                keys.push(iter.key());
                iter.next().map_err(|ref e| map_kv_err(e))?;
            }
            keys
        };

        let mut entries = Vec::with_capacity(raw_keys.len());
        for raw in raw_keys {
            let Some(suffix) = raw.get(prefix_len..) else {
                continue;
            };
            let Ok(key) = std::str::from_utf8(suffix) else {
                tracing::warn!(namespace, "skipping non-UTF-8 key");
                continue;
            };
            let key = key.to_owned();
            if let Some(value) = tx.get(&raw).map_err(|ref e| map_kv_err(e))? {
                entries.push((key, value));
            }
        }
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// Scoped store
// ---------------------------------------------------------------------------

/// A [`KvStore`] view bound to one namespace, with typed JSON access.
///
/// ```rust,ignore
/// use loom_storage::{MemoryKvStore, ScopedKvStore};
/// use std::sync::Arc;
///
/// let records = ScopedKvStore::new(Arc::new(MemoryKvStore::new()), "system:plugins")?;
/// records.set_json("some-id", &record).await?;
/// ```
#[derive(Clone)]
pub struct ScopedKvStore {
    inner: Arc<dyn KvStore>,
    namespace: String,
}

impl std::fmt::Debug for ScopedKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedKvStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl ScopedKvStore {
    /// Bind `store` to `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the namespace is empty
    /// or contains null bytes.
    pub fn new(store: Arc<dyn KvStore>, namespace: impl Into<String>) -> StorageResult<Self> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;
        Ok(Self {
            inner: store,
            namespace,
        })
    }

    /// The bound namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Raw bytes for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] for an empty key, or a backend error.
    pub async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        self.inner.get(&self.namespace, key).await
    }

    /// Store raw bytes under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] for an empty key, or a backend error.
    pub async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        validate_key(key)?;
        self.inner.set(&self.namespace, key, value).await
    }

    /// Delete `key`, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] for an empty key, or a backend error.
    pub async fn delete(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        self.inner.delete(&self.namespace, key).await
    }

    /// Deserialize the JSON value under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the stored bytes are not
    /// valid JSON for `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.get(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StorageError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    /// Serialize `value` as JSON under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if `value` cannot be encoded.
    pub async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> StorageResult<()> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.set(key, bytes).await
    }

    /// Every value in the namespace, decoded as `T`, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] on the first entry that does
    /// not decode.
    pub async fn scan_json<T: DeserializeOwned>(&self) -> StorageResult<Vec<T>> {
        self.inner
            .scan(&self.namespace)
            .await?
            .into_iter()
            .map(|(key, bytes)| {
                serde_json::from_slice(&bytes)
                    .map_err(|e| StorageError::Serialization(format!("{key}: {e}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scoped(namespace: &str) -> ScopedKvStore {
        ScopedKvStore::new(Arc::new(MemoryKvStore::new()), namespace).unwrap()
    }

    #[tokio::test]
    async fn test_memory_set_get_delete() {
        let store = MemoryKvStore::new();
        store.set("ns", "k", b"v1".to_vec()).await.unwrap();
        store.set("ns", "k", b"v2".to_vec()).await.unwrap();
        assert_eq!(store.get("ns", "k").await.unwrap(), Some(b"v2".to_vec()));

        assert!(store.delete("ns", "k").await.unwrap());
        assert!(!store.delete("ns", "k").await.unwrap());
        assert!(store.get("ns", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_scan_is_ordered_and_isolated() {
        let store = MemoryKvStore::new();
        store.set("a", "2", b"two".to_vec()).await.unwrap();
        store.set("a", "1", b"one".to_vec()).await.unwrap();
        store.set("b", "3", b"three".to_vec()).await.unwrap();

        let keys: Vec<String> = store
            .scan("a")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["1", "2"]);
        assert!(store.scan("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_rejects_bad_keys() {
        let store = MemoryKvStore::new();
        assert!(store.set("", "k", Vec::new()).await.is_err());
        assert!(store.set("ns", "a\0b", Vec::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_scoped_json_round_trip() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Entry {
            name: String,
            active: bool,
        }

        let store = scoped("system:plugins");
        let entry = Entry {
            name: "Calculator".into(),
            active: true,
        };
        store.set_json("one", &entry).await.unwrap();

        let loaded: Option<Entry> = store.get_json("one").await.unwrap();
        assert_eq!(loaded, Some(entry));

        let missing: Option<Entry> = store.get_json("two").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_scan_json_reports_corrupt_entry() {
        let store = scoped("ns");
        store.set("good", b"1".to_vec()).await.unwrap();
        store.set("bad", b"{not json".to_vec()).await.unwrap();

        let err = store.scan_json::<u32>().await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(msg) if msg.starts_with("bad")));
    }

    #[test]
    fn test_scoped_rejects_empty_namespace() {
        assert!(ScopedKvStore::new(Arc::new(MemoryKvStore::new()), "").is_err());
    }

    #[cfg(feature = "kv")]
    mod surreal_kv_tests {
        use super::*;

        fn make_store() -> (SurrealKvStore, tempfile::TempDir) {
            let dir = tempfile::tempdir().unwrap();
            let store = SurrealKvStore::open(dir.path()).unwrap();
            (store, dir)
        }

        #[tokio::test]
        async fn test_surreal_set_get_delete() {
            let (store, _dir) = make_store();
            store.set("ns", "k", b"v".to_vec()).await.unwrap();
            assert_eq!(store.get("ns", "k").await.unwrap(), Some(b"v".to_vec()));
            assert!(store.delete("ns", "k").await.unwrap());
            assert!(store.get("ns", "k").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_surreal_scan_stays_in_namespace() {
            let (store, _dir) = make_store();
            store.set("ns1", "a", b"1".to_vec()).await.unwrap();
            store.set("ns1", "b", b"2".to_vec()).await.unwrap();
            store.set("ns2", "c", b"3".to_vec()).await.unwrap();

            let entries = store.scan("ns1").await.unwrap();
            assert_eq!(
                entries,
                vec![("a".to_owned(), b"1".to_vec()), ("b".to_owned(), b"2".to_vec())]
            );
        }
    }
}
