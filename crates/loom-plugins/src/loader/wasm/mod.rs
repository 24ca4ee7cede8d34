//! WebAssembly artifacts, run on Extism.
//!
//! Every load builds a fresh `extism::Plugin`: its own engine store, linear
//! memory and symbol space. Nothing is shared between two loads of the same
//! artifact, let alone between plugins.
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ WasmExtension│────▶│ extism::Plugin │────▶│ WASM guest   │
//! │ (Extension)  │     │ (Mutex)        │     │ loom_* fns   │
//! └──────────────┘     └────────────────┘     └──────────────┘
//!                              │
//!                              ▼
//!                       ┌──────────────┐
//!                       │ Host fns (3) │
//!                       │ UserData     │
//!                       │ <HostState>  │
//!                       └──────────────┘
//! ```
//!
//! Plugin code runs synchronously on the calling thread. Callers on an
//! async runtime use the blocking pool.

mod extension;
mod host;

use std::path::Path;
use std::sync::{Arc, OnceLock};

use extism::{Manifest, PluginBuilder, UserData, Wasm};
use tracing::debug;

use crate::error::{PluginError, PluginResult};
use crate::loader::bundle::Bundle;
use crate::loader::{ArtifactLoader, CodeSpace, LoadedPlugin};

pub use extension::WasmExtension;
use host::{HostState, register_host_functions};

/// Loads WASM modules and bundles.
#[derive(Debug, Clone, Default)]
pub struct WasmArtifactLoader {
    wasi: bool,
}

impl WasmArtifactLoader {
    /// A loader without WASI.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Link WASI into every instance, for guests built for `wasm32-wasip1`.
    #[must_use]
    pub fn with_wasi(mut self, wasi: bool) -> Self {
        self.wasi = wasi;
        self
    }

    /// Whether WASI is linked.
    #[must_use]
    pub fn wasi(&self) -> bool {
        self.wasi
    }
}

impl ArtifactLoader for WasmArtifactLoader {
    fn inspect(&self, bytes: &[u8]) -> PluginResult<String> {
        let bundle = Bundle::read(bytes, "upload")?;
        Ok(bundle.select_entry("upload")?.name.clone())
    }

    fn load(&self, path: &Path) -> PluginResult<LoadedPlugin> {
        let origin = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|e| {
            PluginError::load_failed(&origin, format!("failed to read artifact: {e}"))
        })?;

        let bundle = Bundle::read(&bytes, &origin)?;
        let unit = bundle.select_entry(&origin)?;
        let digest = unit.digest();

        let context = Arc::new(OnceLock::new());
        let user_data = UserData::new(HostState {
            unit: unit.name.clone(),
            context: Arc::clone(&context),
        });

        let manifest = Manifest::new([Wasm::data(unit.bytes.clone())]);
        let builder = PluginBuilder::new(manifest).with_wasi(self.wasi);
        let plugin = register_host_functions(builder, user_data)
            .build()
            .map_err(|e| PluginError::load_failed(&origin, format!("instantiation failed: {e}")))?;

        let extension = WasmExtension::new(plugin, unit.name.clone(), context)
            .map_err(|e| PluginError::load_failed(&origin, e.to_string()))?;

        debug!(
            artifact = %origin,
            unit = %unit.name,
            name = extension.name_str(),
            methods = extension.method_count(),
            "Loaded WASM extension"
        );

        Ok(LoadedPlugin::new(
            Box::new(extension),
            CodeSpace::new(path, unit.name.clone(), digest),
        ))
    }
}
