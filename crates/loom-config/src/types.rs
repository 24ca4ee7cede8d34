use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host paths and persistence.
    pub host: HostSection,
    /// Plugin loader settings.
    pub loader: LoaderSection,
    /// Logging.
    pub logging: LoggingSection,
}

/// `[host]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSection {
    /// Root directory for artifacts and state. `None` means `~/.loom`.
    pub home: Option<PathBuf>,
    /// Backend for plugin records.
    pub store: StoreBackend,
}

/// Where plugin records are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Embedded `SurrealKV` under `<home>/state`.
    #[default]
    SurrealKv,
    /// In-process only. Records vanish on exit, so the `loom` binary refuses
    /// it; meant for embedders and tests.
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "surrealkv" => Ok(Self::SurrealKv),
            "memory" => Ok(Self::Memory),
            other => Err(format!(
                "unknown store '{other}'; expected 'surrealkv' or 'memory'"
            )),
        }
    }
}

/// `[loader]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSection {
    /// Expose WASI imports to plugin modules.
    pub wasi: bool,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base level: `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
    /// Output format: `pretty`, `compact`, `json` or `full`.
    pub format: String,
    /// Extra `EnvFilter` directives such as `loom_plugins=debug`.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}

impl Config {
    /// The resolved home directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHomeDir`] when no home is configured and the
    /// user's home directory cannot be determined.
    pub fn home_dir(&self) -> ConfigResult<PathBuf> {
        match &self.host.home {
            Some(home) => Ok(home.clone()),
            None => default_home(),
        }
    }

    /// Directory holding stored plugin artifacts.
    #[must_use]
    pub fn plugin_dir(home: &Path) -> PathBuf {
        home.join("plugins")
    }

    /// Directory holding the persistent record store.
    #[must_use]
    pub fn state_dir(home: &Path) -> PathBuf {
        home.join("state")
    }
}

/// `~/.loom`
pub(crate) fn default_home() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".loom"))
        .ok_or(ConfigError::NoHomeDir)
}
