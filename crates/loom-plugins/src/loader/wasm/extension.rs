//! [`Extension`] over a WASM guest.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use loom_abi::{MethodSpec, exports};
use serde_json::Value;
use tracing::warn;

use crate::coerce::Arg;
use crate::context::PluginContext;
use crate::contract::{Extension, ExtensionError};
use crate::method::MethodTable;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Instances with a guest call in progress on this thread.
    static EXECUTING: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Marks an instance as executing on this thread until dropped.
struct ReentryGuard(u64);

impl ReentryGuard {
    fn enter(instance: u64) -> Option<Self> {
        EXECUTING.with(|executing| {
            let mut executing = executing.borrow_mut();
            if executing.contains(&instance) {
                None
            } else {
                executing.push(instance);
                Some(Self(instance))
            }
        })
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        EXECUTING.with(|executing| executing.borrow_mut().retain(|&i| i != self.0));
    }
}

/// One guest instance. A guest runs one call at a time.
struct WasmInstance {
    id: u64,
    unit: String,
    plugin: Mutex<extism::Plugin>,
}

impl WasmInstance {
    fn call(&self, export: &str, input: &str) -> Result<String, ExtensionError> {
        // The instance mutex would deadlock a cycle that comes back here on
        // the same thread.
        let _guard = ReentryGuard::enter(self.id).ok_or_else(|| {
            ExtensionError::new(format!(
                "reentrant call into '{}' while it is already executing",
                self.unit
            ))
        })?;

        let mut plugin = self.plugin.lock().unwrap_or_else(PoisonError::into_inner);
        plugin
            .call::<&str, String>(export, input)
            .map_err(|e| ExtensionError::new(format!("{export} failed: {e}")))
    }

    fn has_export(&self, export: &str) -> bool {
        self.plugin
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .function_exists(export)
    }

    fn call_method(&self, export: &str, args: &[Arg]) -> Result<Arg, ExtensionError> {
        let input = Value::Array(args.iter().cloned().map(Arg::into_wire).collect());
        let output = self.call(export, &input.to_string())?;
        if output.is_empty() {
            return Ok(Arg::Null);
        }
        serde_json::from_str(&output)
            .map(Arg::Json)
            .map_err(|e| ExtensionError::new(format!("{export} returned invalid JSON: {e}")))
    }
}

/// A WASM guest seen through the extension contract.
///
/// Name, description and the method table are read from the guest once,
/// at load time.
pub struct WasmExtension {
    instance: Arc<WasmInstance>,
    name: String,
    description: String,
    methods: MethodTable,
    context: Arc<OnceLock<PluginContext>>,
}

impl WasmExtension {
    pub(super) fn new(
        plugin: extism::Plugin,
        unit: String,
        context: Arc<OnceLock<PluginContext>>,
    ) -> Result<Self, ExtensionError> {
        let instance = Arc::new(WasmInstance {
            id: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            unit,
            plugin: Mutex::new(plugin),
        });

        let name = instance.call(exports::NAME, "")?;
        let description = instance.call(exports::DESCRIPTION, "")?;
        let methods = describe(&instance)?;

        Ok(Self {
            instance,
            name,
            description,
            methods,
            context,
        })
    }

    pub(super) fn name_str(&self) -> &str {
        &self.name
    }

    pub(super) fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Name of the unit this instance was built from.
    #[must_use]
    pub fn unit(&self) -> &str {
        &self.instance.unit
    }
}

/// Build the method table from the guest's `loom_describe` export.
fn describe(instance: &Arc<WasmInstance>) -> Result<MethodTable, ExtensionError> {
    if !instance.has_export(exports::DESCRIBE) {
        return Ok(MethodTable::empty());
    }

    let raw = instance.call(exports::DESCRIBE, "")?;
    let specs: Vec<MethodSpec> = serde_json::from_str(&raw).map_err(|e| {
        ExtensionError::new(format!("{} returned an invalid method list: {e}", exports::DESCRIBE))
    })?;

    let mut builder = MethodTable::builder();
    for spec in specs {
        let export = spec.export_name().to_owned();
        if !instance.has_export(&export) {
            return Err(ExtensionError::new(format!(
                "method '{}' is bound to missing export '{export}'",
                spec.name
            )));
        }
        let instance = Arc::clone(instance);
        builder = builder.method(spec, move |args| instance.call_method(&export, args));
    }

    builder.build().map_err(|e| ExtensionError::new(e.to_string()))
}

impl Extension for WasmExtension {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&self, input: &str) -> Result<String, ExtensionError> {
        self.instance.call(exports::EXECUTE, input)
    }

    fn methods(&self) -> &MethodTable {
        &self.methods
    }

    fn set_context(&self, context: PluginContext) {
        if self.context.set(context).is_err() {
            warn!(unit = %self.instance.unit, "Context already set, ignoring");
        }
    }

    fn on_activate(&self) -> Result<(), ExtensionError> {
        if self.instance.has_export(exports::ON_ACTIVATE) {
            self.instance.call(exports::ON_ACTIVATE, "")?;
        }
        Ok(())
    }

    fn on_deactivate(&self) {
        if self.instance.has_export(exports::ON_DEACTIVATE)
            && let Err(e) = self.instance.call(exports::ON_DEACTIVATE, "")
        {
            warn!(unit = %self.instance.unit, error = %e, "Deactivation hook failed");
        }
    }
}

impl fmt::Debug for WasmExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WasmExtension")
            .field("unit", &self.instance.unit)
            .field("name", &self.name)
            .field("methods", &self.methods.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reentry_guard() {
        let outer = ReentryGuard::enter(7).unwrap();
        assert!(ReentryGuard::enter(7).is_none());
        {
            let _other = ReentryGuard::enter(8).unwrap();
        }
        drop(outer);
        assert!(ReentryGuard::enter(7).is_some());
    }

    #[test]
    fn test_guard_is_per_thread() {
        let _held = ReentryGuard::enter(42).unwrap();
        let entered_elsewhere = std::thread::spawn(|| ReentryGuard::enter(42).is_some())
            .join()
            .unwrap();
        assert!(entered_elsewhere);
    }
}
