//! Reaching other plugins through the host.

use serde_json::Value;

use crate::{CrossCallRequest, CrossCallResponse, ListScope, PdkError, PluginInfo, sys};

/// Id of the active plugin called `name` (case-insensitive), if any.
///
/// # Errors
///
/// If the host call fails.
pub fn resolve(name: &str) -> Result<Option<String>, PdkError> {
    let raw = unsafe { sys::loom_resolve_plugin(name.to_owned())? };
    Ok(serde_json::from_str(&raw)?)
}

/// Invoke `method` on the plugin `id` with positional wire arguments.
///
/// The target sees the call exactly as if the host had made it: arguments
/// are coerced to its declared parameter types and the result is shaped by
/// its return type.
///
/// # Errors
///
/// [`PdkError::Call`] when the target is gone, has no such method or fails.
pub fn call(id: &str, method: &str, args: Vec<Value>) -> Result<Value, PdkError> {
    let request = CrossCallRequest {
        plugin: id.to_owned(),
        method: method.to_owned(),
        args,
    };
    let raw = unsafe { sys::loom_call_plugin(serde_json::to_string(&request)?)? };
    let response: CrossCallResponse = serde_json::from_str(&raw)?;
    response
        .into_result()
        .map_err(|(kind, message)| PdkError::Call { kind, message })
}

/// [`resolve`] then [`call`]. `Ok(None)` when nothing is called `name`.
///
/// # Errors
///
/// As for [`call`].
pub fn call_by_name(name: &str, method: &str, args: Vec<Value>) -> Result<Option<Value>, PdkError> {
    match resolve(name)? {
        Some(id) => call(&id, method, args).map(Some),
        None => Ok(None),
    }
}

/// Every uploaded plugin, active or not, oldest upload first.
///
/// # Errors
///
/// If the host call fails.
pub fn list() -> Result<Vec<PluginInfo>, PdkError> {
    list_scoped(ListScope::All)
}

/// Active plugins only, oldest upload first.
///
/// # Errors
///
/// If the host call fails.
pub fn list_active() -> Result<Vec<PluginInfo>, PdkError> {
    list_scoped(ListScope::Active)
}

fn list_scoped(scope: ListScope) -> Result<Vec<PluginInfo>, PdkError> {
    let raw = unsafe { sys::loom_list_plugins(scope.as_str().to_owned())? };
    Ok(serde_json::from_str(&raw)?)
}
