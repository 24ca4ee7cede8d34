//! Artifact enumeration and entry selection.
//!
//! An artifact is either a bare core module or a tar archive (optionally
//! gzip-compressed) of `.wasm` units with an optional `plugin.toml`:
//!
//! ```toml
//! [plugin]
//! entry = "calculator.wasm"
//! hash = "<blake3 hex of the entry unit>"
//! ```
//!
//! A unit qualifies when it is a core module exporting the required
//! contract functions. Components are not accepted.

use std::io::Read;
use std::path::{Component, Path};

use loom_abi::exports;
use serde::Deserialize;
use tracing::warn;
use wasmparser::{Encoding, ExternalKind, Parser, Payload};

use crate::error::{PluginError, PluginResult};

const WASM_MAGIC: &[u8] = b"\0asm";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const MANIFEST_FILE: &str = "plugin.toml";

/// Unit name given to a bare-module artifact.
pub const BARE_MODULE_UNIT: &str = "module.wasm";

/// Maximum number of archive entries examined.
const MAX_ENTRY_COUNT: usize = 1_000;

/// Maximum total unpacked size (256 MB).
const MAX_UNPACKED_SIZE: u64 = 256 * 1024 * 1024;

/// One compiled unit inside an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeUnit {
    /// Path of the unit inside the archive.
    pub name: String,
    /// Module bytes.
    pub bytes: Vec<u8>,
}

impl CodeUnit {
    /// blake3 digest of the module bytes, hex encoded.
    #[must_use]
    pub fn digest(&self) -> String {
        blake3::hash(&self.bytes).to_hex().to_string()
    }

    fn matches(&self, entry: &str) -> bool {
        self.name == entry
            || Path::new(&self.name)
                .file_name()
                .is_some_and(|f| f.to_string_lossy() == entry)
    }
}

/// The `[plugin]` table of `plugin.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BundleManifest {
    /// Unit to instantiate.
    #[serde(default)]
    pub entry: Option<String>,
    /// Expected blake3 digest of the entry unit.
    #[serde(default)]
    pub hash: Option<String>,
}

#[derive(Deserialize)]
struct ManifestFile {
    plugin: BundleManifest,
}

/// The contents of an artifact, in archive order.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    /// Units in archive order.
    pub units: Vec<CodeUnit>,
    /// Parsed `plugin.toml`, when present.
    pub manifest: Option<BundleManifest>,
}

impl Bundle {
    /// Read an artifact. `origin` labels errors.
    ///
    /// # Errors
    ///
    /// [`PluginError::LoadFailed`] when the archive or manifest is malformed
    /// or an entry is unsafe.
    pub fn read(bytes: &[u8], origin: &str) -> PluginResult<Self> {
        if bytes.starts_with(WASM_MAGIC) {
            return Ok(Self {
                units: vec![CodeUnit {
                    name: BARE_MODULE_UNIT.to_owned(),
                    bytes: bytes.to_vec(),
                }],
                manifest: None,
            });
        }

        if bytes.starts_with(GZIP_MAGIC) {
            Self::read_tar(flate2::read::GzDecoder::new(bytes), origin)
        } else {
            Self::read_tar(bytes, origin)
        }
    }

    fn read_tar(reader: impl Read, origin: &str) -> PluginResult<Self> {
        let fail = |message: String| PluginError::load_failed(origin, message);

        let mut archive = tar::Archive::new(reader);
        let mut bundle = Self::default();
        let mut entry_count = 0usize;
        let mut total_size: u64 = 0;

        for entry in archive
            .entries()
            .map_err(|e| fail(format!("not a module or archive: {e}")))?
        {
            let mut entry = entry.map_err(|e| fail(format!("malformed archive entry: {e}")))?;

            entry_count = entry_count.saturating_add(1);
            if entry_count > MAX_ENTRY_COUNT {
                return Err(fail(format!(
                    "archive exceeds maximum entry count ({MAX_ENTRY_COUNT})"
                )));
            }

            if entry.header().entry_type() != tar::EntryType::Regular {
                continue;
            }

            let path = entry
                .path()
                .map_err(|e| fail(format!("unreadable entry path: {e}")))?
                .into_owned();
            if path.components().any(|c| {
                matches!(
                    c,
                    Component::ParentDir | Component::RootDir | Component::Prefix(_)
                )
            }) {
                return Err(fail(format!("unsafe entry path '{}'", path.display())));
            }

            let size = entry.header().size().unwrap_or(0);
            total_size = total_size.saturating_add(size);
            if total_size > MAX_UNPACKED_SIZE {
                return Err(fail(format!(
                    "archive exceeds maximum unpacked size ({MAX_UNPACKED_SIZE} bytes)"
                )));
            }

            let name = path
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/");

            if name == MANIFEST_FILE {
                let mut text = String::new();
                entry
                    .read_to_string(&mut text)
                    .map_err(|e| fail(format!("unreadable {MANIFEST_FILE}: {e}")))?;
                let parsed: ManifestFile = toml::from_str(&text)
                    .map_err(|e| fail(format!("invalid {MANIFEST_FILE}: {e}")))?;
                bundle.manifest = Some(parsed.plugin);
            } else if Path::new(&name)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("wasm"))
            {
                let mut bytes = Vec::new();
                entry
                    .read_to_end(&mut bytes)
                    .map_err(|e| fail(format!("unreadable unit '{name}': {e}")))?;
                bundle.units.push(CodeUnit { name, bytes });
            }
        }

        Ok(bundle)
    }

    /// Pick the unit to instantiate.
    ///
    /// A manifest `entry` wins. Otherwise the first qualifying unit in
    /// archive order is taken, with a warning when there are several.
    ///
    /// # Errors
    ///
    /// [`PluginError::LoadFailed`] when nothing qualifies, the named entry is
    /// missing or does not qualify, or the pinned hash does not match.
    pub fn select_entry(&self, origin: &str) -> PluginResult<&CodeUnit> {
        let manifest = self.manifest.clone().unwrap_or_default();

        let unit = if let Some(entry) = &manifest.entry {
            let unit = self
                .units
                .iter()
                .find(|u| u.matches(entry))
                .ok_or_else(|| {
                    PluginError::load_failed(origin, format!("entry unit '{entry}' not found"))
                })?;
            qualify(&unit.bytes).map_err(|reason| {
                PluginError::load_failed(origin, format!("entry unit '{entry}' {reason}"))
            })?;
            unit
        } else {
            let mut qualifying = Vec::new();
            let mut reasons = Vec::new();
            for unit in &self.units {
                match qualify(&unit.bytes) {
                    Ok(()) => qualifying.push(unit),
                    Err(reason) => reasons.push(format!("{}: {reason}", unit.name)),
                }
            }

            let Some(first) = qualifying.first().copied() else {
                let detail = if reasons.is_empty() {
                    "artifact contains no wasm units".to_owned()
                } else {
                    format!("no unit implements the extension contract ({})", reasons.join("; "))
                };
                return Err(PluginError::load_failed(origin, detail));
            };

            if qualifying.len() > 1 {
                let candidates: Vec<&str> = qualifying.iter().map(|u| u.name.as_str()).collect();
                warn!(
                    artifact = origin,
                    chosen = %first.name,
                    candidates = ?candidates,
                    "Several units implement the extension contract, taking the first; declare `entry` in plugin.toml to choose"
                );
            }
            first
        };

        if let Some(expected) = &manifest.hash {
            let actual = unit.digest();
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(PluginError::load_failed(
                    origin,
                    format!("hash mismatch for '{}': expected {expected}, got {actual}", unit.name),
                ));
            }
        }

        Ok(unit)
    }
}

/// Check that `bytes` are a core module exporting every required contract
/// function. The error says what is wrong.
///
/// # Errors
///
/// A human-readable reason when the unit does not qualify.
pub fn qualify(bytes: &[u8]) -> Result<(), String> {
    let mut missing: Vec<&str> = exports::REQUIRED.to_vec();

    for payload in Parser::new(0).parse_all(bytes) {
        let payload = payload.map_err(|e| format!("is not valid wasm: {e}"))?;
        match payload {
            Payload::Version {
                encoding: Encoding::Component,
                ..
            } => return Err("is a component, not a core module".to_owned()),
            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export.map_err(|e| format!("has a malformed export: {e}"))?;
                    if export.kind == ExternalKind::Func {
                        missing.retain(|name| *name != export.name);
                    }
                }
            },
            _ => {},
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("does not export {}", missing.join(", ")))
    }
}
