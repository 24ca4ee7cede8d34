//! An [`ArtifactLoader`] over native fixtures.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use loom_plugins::{ArtifactLoader, CodeSpace, LoadedPlugin, PluginError, PluginResult};

use crate::extensions::{Fixture, HookLog};

const PREFIX: &str = "loom-fixture:";

/// Artifact bytes that load as `fixture`.
#[must_use]
pub fn fixture_artifact(fixture: Fixture) -> Vec<u8> {
    format!("{PREFIX}{}", fixture.tag()).into_bytes()
}

/// Loads `loom-fixture:<kind>` artifacts as native fixture extensions.
#[derive(Debug, Clone, Default)]
pub struct FixtureLoader {
    hooks: HookLog,
    loads: Arc<AtomicUsize>,
}

impl FixtureLoader {
    /// A loader with a fresh hook log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook calls made by every instance this loader produced.
    #[must_use]
    pub fn hooks(&self) -> &HookLog {
        &self.hooks
    }

    /// Successful loads so far.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

fn parse(bytes: &[u8], origin: &str) -> PluginResult<Fixture> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim().strip_prefix(PREFIX))
        .ok_or_else(|| PluginError::load_failed(origin, "not a fixture artifact"))?
        .parse()
        .map_err(|message: String| PluginError::load_failed(origin, message))
}

impl ArtifactLoader for FixtureLoader {
    fn inspect(&self, bytes: &[u8]) -> PluginResult<String> {
        parse(bytes, "upload").map(|f| f.tag().to_owned())
    }

    fn load(&self, path: &Path) -> PluginResult<LoadedPlugin> {
        let origin = path.display();
        let bytes = std::fs::read(path)
            .map_err(|e| PluginError::load_failed(&origin, format!("cannot read artifact: {e}")))?;
        let fixture = parse(&bytes, &origin.to_string())?;
        let extension = fixture
            .instantiate(&self.hooks)
            .map_err(|e| PluginError::load_failed(&origin, e.to_string()))?;

        self.loads.fetch_add(1, Ordering::SeqCst);
        let digest = blake3::hash(&bytes).to_hex().to_string();
        Ok(LoadedPlugin::new(
            extension,
            CodeSpace::new(path, fixture.tag(), digest),
        ))
    }
}
