//! Artifact storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::PluginResult;

/// Where uploaded artifacts are kept.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist `bytes` and return a stable path to them.
    async fn store(&self, bytes: &[u8], suggested_name: &str) -> PluginResult<PathBuf>;

    /// Delete a stored artifact. Deleting a missing artifact succeeds.
    async fn delete(&self, path: &Path) -> PluginResult<()>;
}

/// Artifacts as files under one directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Store artifacts under `root`, created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The storage directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Reduce a suggested name to a safe file name: its final component, with
/// anything outside `[A-Za-z0-9._-]` replaced.
fn sanitize(suggested: &str) -> String {
    let last = suggested
        .rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "artifact".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Write `bytes` to `staging` and move it to `path`. On any failure the
/// staging file, complete or partial, is removed.
async fn write_staged(staging: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let result = match tokio::fs::write(staging, bytes).await {
        Ok(()) => tokio::fs::rename(staging, path).await,
        Err(e) => Err(e),
    };
    if result.is_err()
        && let Err(cleanup) = tokio::fs::remove_file(staging).await
        && cleanup.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %staging.display(), error = %cleanup, "Failed to delete staging file");
    }
    result
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn store(&self, bytes: &[u8], suggested_name: &str) -> PluginResult<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;

        let id = Uuid::new_v4();
        let file_name = format!("plugin-{id}-{}", sanitize(suggested_name));
        let path = self.root.join(&file_name);
        let staging = self.root.join(format!(".{file_name}.tmp"));

        write_staged(&staging, &path, bytes).await?;

        debug!(path = %path.display(), size = bytes.len(), "Stored artifact");
        Ok(path)
    }

    async fn delete(&self, path: &Path) -> PluginResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
