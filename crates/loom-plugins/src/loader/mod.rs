//! Turning stored artifacts into live extension instances.
//!
//! An [`ArtifactLoader`] produces exactly one [`LoadedPlugin`] per load: the
//! extension instance plus the [`CodeSpace`] its code lives in. Each load is
//! independent, so two plugins never share symbols, memory or state, and
//! dropping a `LoadedPlugin` discards the instance and everything behind it.

pub mod bundle;
pub mod wasm;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::contract::Extension;
use crate::error::PluginResult;

pub use bundle::{Bundle, BundleManifest, CodeUnit};
pub use wasm::WasmArtifactLoader;

/// The isolated code context an instance was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSpace {
    /// Artifact the code came from.
    pub artifact: PathBuf,
    /// Name of the unit inside the artifact that was instantiated.
    pub unit: String,
    /// blake3 digest of the unit, hex encoded.
    pub digest: String,
}

impl CodeSpace {
    /// Describe the unit `unit` of `artifact`.
    #[must_use]
    pub fn new(
        artifact: impl Into<PathBuf>,
        unit: impl Into<String>,
        digest: impl Into<String>,
    ) -> Self {
        Self {
            artifact: artifact.into(),
            unit: unit.into(),
            digest: digest.into(),
        }
    }
}

/// An instantiated extension and the code space it was loaded into.
///
/// Owned by the registry. Never cloned.
pub struct LoadedPlugin {
    extension: Box<dyn Extension>,
    space: CodeSpace,
}

impl LoadedPlugin {
    /// Pair an instance with the space it was loaded into.
    #[must_use]
    pub fn new(extension: Box<dyn Extension>, space: CodeSpace) -> Self {
        Self { extension, space }
    }

    /// The instance.
    #[must_use]
    pub fn extension(&self) -> &dyn Extension {
        self.extension.as_ref()
    }

    /// Where the instance came from.
    #[must_use]
    pub fn space(&self) -> &CodeSpace {
        &self.space
    }
}

impl fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("name", &self.extension.name())
            .field("space", &self.space)
            .finish()
    }
}

/// Produces extension instances from artifacts.
///
/// Loading runs plugin code (instantiation and the name and description
/// calls), so callers on an async runtime run it on the blocking pool.
pub trait ArtifactLoader: Send + Sync {
    /// Check that `bytes` hold a loadable extension without instantiating
    /// anything. Returns the name of the unit that would be loaded.
    ///
    /// # Errors
    ///
    /// [`PluginError::LoadFailed`](crate::PluginError::LoadFailed) when no
    /// unit qualifies or the artifact is malformed.
    fn inspect(&self, bytes: &[u8]) -> PluginResult<String>;

    /// Load the artifact at `path` into a fresh code space and instantiate
    /// its extension.
    ///
    /// # Errors
    ///
    /// [`PluginError::LoadFailed`](crate::PluginError::LoadFailed) when the
    /// artifact cannot be read, holds no qualifying unit, or instantiation
    /// fails.
    fn load(&self, path: &Path) -> PluginResult<LoadedPlugin>;
}
