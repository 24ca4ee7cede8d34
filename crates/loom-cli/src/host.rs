//! Wiring the registry from configuration.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use loom_config::{Config, StoreBackend};
use loom_plugins::{FsArtifactStore, KvPluginStore, PluginRegistry, WasmArtifactLoader};
use loom_storage::{KvStore, SurrealKvStore};
use tracing::warn;

use crate::theme::Theme;

/// A started registry and the store behind it.
pub(crate) struct Host {
    pub(crate) registry: PluginRegistry,
    store: Arc<SurrealKvStore>,
}

impl Host {
    /// Build the registry described by `config` and reload active plugins.
    pub(crate) async fn open(config: &Config) -> Result<Self> {
        let home = config.home_dir()?;

        // Every run is its own process, so records must outlive it.
        if config.host.store == StoreBackend::Memory {
            bail!(
                "the memory store does not persist between `loom` invocations; \
                 set host.store = \"surrealkv\" or unset LOOM_STORE"
            );
        }

        let dir = Config::state_dir(&home);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let store = Arc::new(SurrealKvStore::open(&dir)?);
        let kv: Arc<dyn KvStore> = Arc::clone(&store) as Arc<dyn KvStore>;

        let registry = PluginRegistry::new(
            Arc::new(KvPluginStore::new(kv)?),
            Arc::new(FsArtifactStore::new(Config::plugin_dir(&home))),
            Arc::new(WasmArtifactLoader::new().with_wasi(config.loader.wasi)),
        );

        let report = registry.start().await.context("failed to reload plugins")?;
        for (id, reason) in &report.deactivated {
            eprintln!(
                "{}",
                Theme::warning(&format!("plugin {id} failed to reload and was deactivated: {reason}"))
            );
        }

        Ok(Self { registry, store })
    }

    /// Stop every plugin and flush the store.
    pub(crate) async fn close(self) {
        self.registry.shutdown().await;
        if let Err(e) = self.store.close().await {
            warn!(error = %e, "Failed to close record store");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_is_rejected() {
        let home = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.host.home = Some(home.path().to_path_buf());
        config.host.store = StoreBackend::Memory;

        let err = Host::open(&config).await.err().unwrap();
        assert!(err.to_string().contains("memory store does not persist"), "{err}");
        assert!(!Config::state_dir(home.path()).exists());
    }
}
