//! A registry wired over in-memory storage, for integration tests.

use std::path::PathBuf;
use std::sync::Arc;

use loom_plugins::{
    FsArtifactStore, KvPluginStore, PluginId, PluginRecord, PluginRegistry, StartupReport,
};
use loom_storage::{KvStore, MemoryKvStore};
use tempfile::TempDir;

use crate::extensions::{Fixture, HookLog};
use crate::loader::{FixtureLoader, fixture_artifact};
use crate::store::FlakyStore;

/// Install a test-writer subscriber. Safe to call from every test.
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// A registry over a [`MemoryKvStore`] behind a [`FlakyStore`], a temporary
/// artifact directory and a [`FixtureLoader`].
///
/// Panics on setup failures; it is only meant for tests.
pub struct TestHost {
    /// The registry under test.
    pub registry: Arc<PluginRegistry>,
    store: FlakyStore,
    loader: FixtureLoader,
    artifacts: TempDir,
}

impl TestHost {
    /// A fresh host with nothing uploaded.
    ///
    /// # Panics
    ///
    /// If the temporary directory or record store cannot be created.
    pub async fn new() -> Self {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let store = FlakyStore::new(KvPluginStore::new(kv).expect("failed to open record store"));
        let artifacts = TempDir::new().expect("failed to create artifact dir");
        let loader = FixtureLoader::new();
        let registry = Arc::new(build(&store, &artifacts, &loader));
        Self {
            registry,
            store,
            loader,
            artifacts,
        }
    }

    /// Make record saves fail (`true`) or succeed again (`false`), across
    /// restarts.
    pub fn fail_saves(&self, fail: bool) {
        self.store.fail_saves(fail);
    }

    /// Hook calls across every instance this host loaded.
    #[must_use]
    pub fn hooks(&self) -> &HookLog {
        self.loader.hooks()
    }

    /// The fixture loader, for load counts.
    #[must_use]
    pub fn loader(&self) -> &FixtureLoader {
        &self.loader
    }

    /// Directory artifacts are stored in.
    #[must_use]
    pub fn artifact_dir(&self) -> PathBuf {
        self.artifacts.path().to_path_buf()
    }

    /// Upload `fixture`, leaving it inactive.
    ///
    /// # Panics
    ///
    /// If the upload fails.
    pub async fn upload(&self, fixture: Fixture) -> PluginRecord {
        self.registry
            .upload(fixture_artifact(fixture), fixture.tag())
            .await
            .expect("upload failed")
    }

    /// Upload and activate `fixture`.
    ///
    /// # Panics
    ///
    /// If either step fails.
    pub async fn upload_active(&self, fixture: Fixture) -> PluginId {
        let record = self.upload(fixture).await;
        self.registry
            .activate(record.id)
            .await
            .expect("activation failed");
        record.id
    }

    /// Shut the registry down and start a new one over the same records and
    /// artifacts, as a host restart would.
    ///
    /// # Panics
    ///
    /// If the reload hits a storage failure.
    pub async fn restart(&mut self) -> StartupReport {
        self.registry.shutdown().await;
        self.registry = Arc::new(build(&self.store, &self.artifacts, &self.loader));
        self.registry.start().await.expect("startup failed")
    }
}

fn build(store: &FlakyStore, artifacts: &TempDir, loader: &FixtureLoader) -> PluginRegistry {
    PluginRegistry::new(
        Arc::new(store.clone()),
        Arc::new(FsArtifactStore::new(artifacts.path())),
        Arc::new(loader.clone()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_host_upload_active() {
        let host = TestHost::new().await;
        let id = host.upload_active(Fixture::Echo).await;
        assert!(host.registry.is_active(id));
        assert_eq!(host.hooks().count("activate:Echo Plugin"), 1);
    }

    #[tokio::test]
    async fn test_restart_reloads() {
        let mut host = TestHost::new().await;
        let id = host.upload_active(Fixture::Adder).await;
        let report = host.restart().await;
        assert_eq!(report.reloaded, vec![id]);
        assert!(host.registry.is_active(id));
        assert_eq!(host.hooks().count("deactivate:Calculator Plugin"), 1);
    }
}
