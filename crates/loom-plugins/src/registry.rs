//! Plugin registry and lifecycle manager.
//!
//! The registry is the only owner of loaded instances and the single point
//! of concurrent access control:
//!
//! - Lifecycle operations (upload, activate, deactivate, remove, startup,
//!   shutdown) are serialized by one async mutex.
//! - Invocations never take that mutex. They lease the instance from the
//!   live map and run plugin code on the blocking pool.
//! - Deactivation removes the instance from the live map first, waits for
//!   in-flight calls to finish, and only then runs `on_deactivate`.
//!
//! A record is active in storage exactly when a live instance exists.
//! [`PluginRegistry::start`] re-establishes that at every process start.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactStore;
use crate::bridge::{self, MethodInfo, SafeMethodInfo, Surface};
use crate::catalog::Catalog;
use crate::context::PluginContext;
use crate::error::{PluginError, PluginResult};
use crate::id::PluginId;
use crate::live::{Lease, LivePlugins};
use crate::loader::{ArtifactLoader, LoadedPlugin};
use crate::request::{PluginRequest, PluginTarget};
use crate::store::{NewPluginRecord, PluginRecord, PluginStore};

/// Method used when a call names none.
pub const DEFAULT_METHOD: &str = "execute";

/// Outcome of the startup reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupReport {
    /// Plugins reloaded and active again.
    pub reloaded: Vec<PluginId>,
    /// Plugins that failed to reload and were marked inactive, with the reason.
    pub deactivated: Vec<(PluginId, String)>,
}

/// Owns plugin records, live instances and their lifecycle.
pub struct PluginRegistry {
    store: Arc<dyn PluginStore>,
    artifacts: Arc<dyn ArtifactStore>,
    loader: Arc<dyn ArtifactLoader>,
    live: Arc<LivePlugins>,
    catalog: Arc<Catalog>,
    context: PluginContext,
    lifecycle: Mutex<()>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("active", &self.live.ids())
            .finish_non_exhaustive()
    }
}

impl PluginRegistry {
    /// Create a registry. Nothing is loaded until [`start`](Self::start).
    #[must_use]
    pub fn new(
        store: Arc<dyn PluginStore>,
        artifacts: Arc<dyn ArtifactStore>,
        loader: Arc<dyn ArtifactLoader>,
    ) -> Self {
        let live = Arc::new(LivePlugins::default());
        let catalog = Arc::new(Catalog::default());
        let context = PluginContext::new(&live, &catalog);
        Self {
            store,
            artifacts,
            loader,
            live,
            catalog,
            context,
            lifecycle: Mutex::new(()),
        }
    }

    /// The cross-plugin context handed to every activated plugin.
    #[must_use]
    pub fn context(&self) -> PluginContext {
        self.context.clone()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Reload every record marked active. A record that fails to reload is
    /// marked inactive and the rest carry on.
    ///
    /// Also fills the plugin listing seen through [`PluginContext`] from the
    /// stored records.
    ///
    /// # Errors
    ///
    /// Only storage failures abort the reload.
    pub async fn start(&self) -> PluginResult<StartupReport> {
        let _guard = self.lifecycle.lock().await;
        let mut report = StartupReport::default();
        self.catalog.replace(&self.store.find_all().await?);

        for mut record in self.store.find_active().await? {
            if self.live.contains(record.id) {
                continue;
            }
            match self.instantiate(record.artifact.clone()).await {
                Ok(plugin) => {
                    self.live.insert(record.id, plugin);
                    info!(plugin_id = %record.id, name = %record.name, "Reloaded plugin");
                    report.reloaded.push(record.id);
                },
                Err(e) => {
                    warn!(
                        plugin_id = %record.id,
                        name = %record.name,
                        error = %e,
                        "Plugin failed to reload, marking inactive"
                    );
                    record.active = false;
                    self.store.save(&record).await?;
                    self.catalog.upsert(&record);
                    report.deactivated.push((record.id, e.to_string()));
                },
            }
        }

        Ok(report)
    }

    /// Store an artifact and register an inactive plugin for it.
    ///
    /// The artifact is checked for a loadable extension first; nothing is
    /// stored if it has none.
    ///
    /// # Errors
    ///
    /// [`PluginError::LoadFailed`] for artifacts without a qualifying unit,
    /// or a storage error. A failed upload leaves nothing behind.
    pub async fn upload(&self, bytes: Vec<u8>, suggested_name: &str) -> PluginResult<PluginRecord> {
        let _guard = self.lifecycle.lock().await;

        let loader = Arc::clone(&self.loader);
        let (bytes, unit) = run_blocking("inspect", move || {
            let unit = loader.inspect(&bytes)?;
            Ok((bytes, unit))
        })
        .await?;

        let artifact = self.artifacts.store(&bytes, suggested_name).await?;
        let new = NewPluginRecord {
            name: suggested_name.to_owned(),
            description: String::new(),
            artifact: artifact.clone(),
        };
        let record = match self.store.create(new).await {
            Ok(record) => record,
            Err(e) => {
                if let Err(cleanup) = self.artifacts.delete(&artifact).await {
                    warn!(path = %artifact.display(), error = %cleanup, "Failed to delete orphaned artifact");
                }
                return Err(e);
            },
        };

        self.catalog.upsert(&record);
        info!(plugin_id = %record.id, name = %record.name, unit = %unit, "Uploaded plugin");
        Ok(record)
    }

    /// Load, initialize and register a plugin.
    ///
    /// The plugin's own name and description replace the stored ones.
    ///
    /// # Errors
    ///
    /// - [`PluginError::NotFound`] for an unknown id
    /// - [`PluginError::InvalidState`] if already active
    /// - [`PluginError::LoadFailed`] if loading or `on_activate` fails; the
    ///   record is left untouched
    pub async fn activate(&self, id: PluginId) -> PluginResult<PluginRecord> {
        let _guard = self.lifecycle.lock().await;

        let mut record = self.record(id).await?;
        if record.active || self.live.contains(id) {
            return Err(PluginError::invalid_state(id, "is already active"));
        }

        let plugin = self.instantiate(record.artifact.clone()).await?;

        record.name = plugin.extension().name().to_owned();
        record.description = plugin.extension().description().to_owned();
        record.active = true;
        if let Err(e) = self.store.save(&record).await {
            retire(id, plugin).await;
            return Err(e);
        }
        self.catalog.upsert(&record);

        self.live.insert(id, plugin);
        info!(plugin_id = %id, name = %record.name, "Activated plugin");
        Ok(record)
    }

    /// Mark a plugin inactive, unregister it, wait for its in-flight calls,
    /// then run its `on_deactivate` and discard it.
    ///
    /// The record is saved before the instance is touched, so a storage
    /// failure leaves the plugin active and serving.
    ///
    /// # Errors
    ///
    /// [`PluginError::NotFound`] for an unknown id,
    /// [`PluginError::InvalidState`] if the plugin is not active, or a
    /// storage error.
    pub async fn deactivate(&self, id: PluginId) -> PluginResult<PluginRecord> {
        let _guard = self.lifecycle.lock().await;

        let mut record = self.record(id).await?;
        if !self.live.contains(id) {
            return Err(PluginError::invalid_state(id, "is not active"));
        }

        record.active = false;
        self.store.save(&record).await?;
        self.catalog.upsert(&record);

        let draining = self
            .live
            .remove(id)
            .ok_or_else(|| PluginError::invalid_state(id, "is not active"))?;
        debug!(plugin_id = %id, "Waiting for in-flight calls");
        retire(id, draining.wait().await).await;

        info!(plugin_id = %id, name = %record.name, "Deactivated plugin");
        Ok(record)
    }

    /// Delete an inactive plugin's artifact and record.
    ///
    /// # Errors
    ///
    /// [`PluginError::NotFound`] for an unknown id, or
    /// [`PluginError::InvalidState`] while the plugin is active.
    pub async fn remove(&self, id: PluginId) -> PluginResult<PluginRecord> {
        let _guard = self.lifecycle.lock().await;

        let record = self.record(id).await?;
        if record.active || self.live.contains(id) {
            return Err(PluginError::invalid_state(id, "must be deactivated first"));
        }

        self.artifacts.delete(&record.artifact).await?;
        self.store.delete(id).await?;
        self.catalog.remove(id);
        info!(plugin_id = %id, name = %record.name, "Removed plugin");
        Ok(record)
    }

    /// Deactivate every live instance without touching their records, so
    /// they come back at the next [`start`](Self::start).
    pub async fn shutdown(&self) {
        let _guard = self.lifecycle.lock().await;
        for (id, draining) in self.live.remove_all() {
            retire(id, draining.wait().await).await;
            debug!(plugin_id = %id, "Shut down plugin");
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Every record, oldest upload first.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn list(&self) -> PluginResult<Vec<PluginRecord>> {
        self.store.find_all().await
    }

    /// The record for `id`.
    ///
    /// # Errors
    ///
    /// [`PluginError::NotFound`] for an unknown id.
    pub async fn get(&self, id: PluginId) -> PluginResult<PluginRecord> {
        self.record(id).await
    }

    /// Whether a live instance exists for `id`.
    #[must_use]
    pub fn is_active(&self, id: PluginId) -> bool {
        self.live.contains(id)
    }

    /// Ids of the active plugins.
    #[must_use]
    pub fn active_ids(&self) -> Vec<PluginId> {
        self.live.ids()
    }

    /// Every method on the unrestricted surface.
    ///
    /// Inactive plugins are inspected through a throwaway instance that gets
    /// no context, no `on_activate` and is never registered.
    ///
    /// # Errors
    ///
    /// [`PluginError::NotFound`] for an unknown id, or
    /// [`PluginError::LoadFailed`] if an inactive plugin cannot be loaded.
    pub async fn list_methods(&self, id: PluginId) -> PluginResult<Vec<MethodInfo>> {
        if let Some(lease) = self.live.lease(id) {
            return Ok(bridge::list_methods(lease.extension()));
        }

        let record = self.record(id).await?;
        let loader = Arc::clone(&self.loader);
        run_blocking("list_methods", move || {
            let plugin = load_guarded(loader.as_ref(), &record.artifact)?;
            Ok(bridge::list_methods(plugin.extension()))
        })
        .await
    }

    /// Methods declared safe, with their descriptions.
    ///
    /// # Errors
    ///
    /// [`PluginError::NotFound`] for an unknown id, or
    /// [`PluginError::InvalidState`] if the plugin is not active.
    pub async fn list_safe_methods(&self, id: PluginId) -> PluginResult<Vec<SafeMethodInfo>> {
        let lease = self.lease(id).await?;
        Ok(bridge::list_safe_methods(lease.extension()))
    }

    // -----------------------------------------------------------------------
    // Invocation
    // -----------------------------------------------------------------------

    /// Call the plugin's text entry point.
    ///
    /// # Errors
    ///
    /// [`PluginError::NotFound`], [`PluginError::InvalidState`] for an
    /// inactive plugin, or [`PluginError::Execution`].
    pub async fn execute_simple(&self, id: PluginId, input: &str) -> PluginResult<String> {
        let lease = self.lease(id).await?;
        let input = input.to_owned();
        run_blocking(DEFAULT_METHOD, move || {
            bridge::execute_simple(lease.extension(), &input)
        })
        .await
    }

    /// Invoke a method through the unrestricted surface.
    ///
    /// # Errors
    ///
    /// Lookup errors as for [`execute_simple`](Self::execute_simple), then
    /// [`PluginError::MethodNotFound`], [`PluginError::ArgumentCoercion`] or
    /// [`PluginError::Execution`].
    pub async fn invoke(&self, id: PluginId, method: &str, args: Vec<Value>) -> PluginResult<Value> {
        self.call(id, method, args, Surface::Unrestricted).await
    }

    /// Invoke a method through the safe surface.
    ///
    /// # Errors
    ///
    /// As for [`invoke`](Self::invoke). Methods not declared safe are
    /// [`PluginError::MethodNotFound`].
    pub async fn safe_invoke(
        &self,
        id: PluginId,
        method: &str,
        args: Vec<Value>,
    ) -> PluginResult<Value> {
        self.call(id, method, args, Surface::Safe).await
    }

    /// Dispatch a tagged request.
    ///
    /// # Errors
    ///
    /// Whatever the dispatched operation reports.
    pub async fn execute(&self, id: PluginId, request: PluginRequest) -> PluginResult<Value> {
        match request {
            PluginRequest::Text { input } => self.execute_simple(id, &input).await.map(Value::String),
            PluginRequest::Call { method, args } => self.invoke(id, &method, args).await,
            PluginRequest::Args { args } => self.invoke(id, DEFAULT_METHOD, args).await,
        }
    }

    /// Invoke a plugin addressed by id or by name, defaulting the method to
    /// [`DEFAULT_METHOD`].
    ///
    /// # Errors
    ///
    /// [`PluginError::NotFound`] when a name matches no active plugin, then
    /// as for [`invoke`](Self::invoke).
    pub async fn resolve_and_invoke(
        &self,
        target: &PluginTarget,
        method: Option<&str>,
        args: Vec<Value>,
    ) -> PluginResult<Value> {
        let id = match target {
            PluginTarget::Id(id) => *id,
            PluginTarget::Name(name) => self
                .context
                .resolve(name)
                .ok_or_else(|| PluginError::NotFound(name.clone()))?,
        };
        self.invoke(id, method.unwrap_or(DEFAULT_METHOD), args).await
    }

    async fn call(
        &self,
        id: PluginId,
        method: &str,
        args: Vec<Value>,
        surface: Surface,
    ) -> PluginResult<Value> {
        let lease = self.lease(id).await?;
        let method = method.to_owned();
        run_blocking("invoke", move || {
            bridge::invoke(lease.extension(), &method, &args, surface)
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn record(&self, id: PluginId) -> PluginResult<PluginRecord> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| PluginError::NotFound(id.to_string()))
    }

    async fn lease(&self, id: PluginId) -> PluginResult<Lease> {
        if let Some(lease) = self.live.lease(id) {
            return Ok(lease);
        }
        match self.store.find(id).await? {
            Some(_) => Err(PluginError::invalid_state(id, "is not active")),
            None => Err(PluginError::NotFound(id.to_string())),
        }
    }

    /// Load an artifact, hand it the context and run `on_activate`.
    async fn instantiate(&self, artifact: PathBuf) -> PluginResult<LoadedPlugin> {
        let loader = Arc::clone(&self.loader);
        let context = self.context.clone();
        run_blocking("on_activate", move || {
            let plugin = load_guarded(loader.as_ref(), &artifact)?;
            plugin.extension().set_context(context);
            bridge::guarded("on_activate", || plugin.extension().on_activate()).map_err(|e| {
                PluginError::load_failed(artifact.display(), format!("activation failed: {e}"))
            })?;
            Ok(plugin)
        })
        .await
    }
}

fn load_guarded(loader: &dyn ArtifactLoader, artifact: &Path) -> PluginResult<LoadedPlugin> {
    catch_unwind(AssertUnwindSafe(|| loader.load(artifact)))
        .unwrap_or_else(|_| Err(PluginError::load_failed(artifact.display(), "loader panicked")))
}

/// Run `on_deactivate` and drop the instance, off the async runtime.
async fn retire(id: PluginId, plugin: LoadedPlugin) {
    let finished = tokio::task::spawn_blocking(move || {
        catch_unwind(AssertUnwindSafe(|| plugin.extension().on_deactivate())).is_ok()
    })
    .await;
    if !matches!(finished, Ok(true)) {
        warn!(plugin_id = %id, "Deactivation hook panicked");
    }
}

async fn run_blocking<T, F>(label: &str, f: F) -> PluginResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> PluginResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| {
            Err(PluginError::Execution {
                method: label.to_owned(),
                message: format!("plugin task failed: {e}"),
            })
        })
}
