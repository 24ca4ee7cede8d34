//! Config file discovery and layered loading.
//!
//! 1. Parse `defaults.toml` as the base
//! 2. Merge `<home>/config.toml` (user)
//! 3. Merge the explicit `--config` file, which must exist
//! 4. Apply `LOOM_*` environment overrides
//! 5. Deserialize and validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Config, StoreBackend, default_home};
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Load the configuration with layered precedence.
///
/// `home` replaces `~/.loom` both as the place to look for `config.toml`
/// and as `host.home`, taking precedence over files and environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any layer is malformed or the merged
/// configuration fails validation.
pub fn load(explicit: Option<&Path>, home: Option<&Path>) -> ConfigResult<Config> {
    let env_vars: HashMap<String, String> = std::env::vars()
        .filter(|(k, _)| k.starts_with("LOOM_"))
        .collect();
    load_with_env(explicit, home, &env_vars)
}

pub(crate) fn load_with_env(
    explicit: Option<&Path>,
    home: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<Config> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    // LOOM_HOME also decides where the user file is looked up.
    let home_dir = match (home, env_vars.get("LOOM_HOME")) {
        (Some(h), _) => h.to_path_buf(),
        (None, Some(h)) => PathBuf::from(h),
        (None, None) => default_home()?,
    };

    let user_path = home_dir.join("config.toml");
    if let Some(overlay) = try_load_file(&user_path)? {
        deep_merge(&mut merged, overlay);
        info!(path = %user_path.display(), "loaded user config");
    }

    if let Some(path) = explicit {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
        })?;
        deep_merge(&mut merged, overlay);
        info!(path = %path.display(), "loaded explicit config");
    }

    let mut config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    apply_env_overrides(&mut config, env_vars)?;
    // An explicit home wins over every layer.
    if home.is_some() || config.host.home.is_none() {
        config.host.home = Some(home_dir);
    }

    validate::validate(&config)?;
    Ok(config)
}

/// Overlay `overlay` onto `base`, recursing into tables.
fn deep_merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_table.insert(key, value);
                    },
                }
            }
        },
        (slot, value) => *slot = value,
    }
}

fn apply_env_overrides(
    config: &mut Config,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<()> {
    if let Some(home) = env_vars.get("LOOM_HOME") {
        config.host.home = Some(PathBuf::from(home));
        debug!(var = "LOOM_HOME", "applied environment override");
    }
    if let Some(store) = env_vars.get("LOOM_STORE") {
        config.host.store =
            store
                .parse::<StoreBackend>()
                .map_err(|message| ConfigError::EnvError {
                    var_name: "LOOM_STORE".to_owned(),
                    message,
                })?;
    }
    if let Some(level) = env_vars.get("LOOM_LOG_LEVEL") {
        config.logging.level.clone_from(level);
    }
    if let Some(format) = env_vars.get("LOOM_LOG_FORMAT") {
        config.logging.format.clone_from(format);
    }
    Ok(())
}

/// Read and parse a file, `None` if it does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    toml::from_str(&content)
        .map(Some)
        .map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_defaults_deserialize() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_defaults_only() {
        let home = tempfile::tempdir().unwrap();
        let config = load_with_env(None, Some(home.path()), &no_env()).unwrap();
        assert_eq!(config.host.home.as_deref(), Some(home.path()));
        assert_eq!(config.host.store, StoreBackend::SurrealKv);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_user_then_explicit_precedence() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(
            home.path().join("config.toml"),
            "[logging]\nlevel = \"info\"\nformat = \"json\"\n",
        )
        .unwrap();
        let explicit = home.path().join("override.toml");
        std::fs::write(&explicit, "[logging]\nlevel = \"debug\"\n").unwrap();

        let config = load_with_env(Some(&explicit), Some(home.path()), &no_env()).unwrap();
        assert_eq!(config.logging.level, "debug");
        // Untouched by the explicit layer.
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let home = tempfile::tempdir().unwrap();
        let missing = home.path().join("nope.toml");
        let err = load_with_env(Some(&missing), Some(home.path()), &no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_env_overrides_files() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("config.toml"), "[host]\nstore = \"surrealkv\"\n").unwrap();

        let env = HashMap::from([
            ("LOOM_STORE".to_owned(), "memory".to_owned()),
            ("LOOM_LOG_LEVEL".to_owned(), "trace".to_owned()),
        ]);
        let config = load_with_env(None, Some(home.path()), &env).unwrap();
        assert_eq!(config.host.store, StoreBackend::Memory);
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_invalid_env_store() {
        let home = tempfile::tempdir().unwrap();
        let env = HashMap::from([("LOOM_STORE".to_owned(), "postgres".to_owned())]);
        let err = load_with_env(None, Some(home.path()), &env).unwrap_err();
        assert!(matches!(err, ConfigError::EnvError { var_name, .. } if var_name == "LOOM_STORE"));
    }

    #[test]
    fn test_malformed_user_file() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("config.toml"), "[logging\n").unwrap();
        let err = load_with_env(None, Some(home.path()), &no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_deep_merge_keeps_siblings() {
        let mut base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\n").unwrap();
        deep_merge(&mut base, overlay);
        assert_eq!(base["a"]["x"].as_integer(), Some(1));
        assert_eq!(base["a"]["y"].as_integer(), Some(3));
    }
}
