//! Host functions imported by guests.
//!
//! | Function | Input | Output |
//! |----------|-------|--------|
//! | `loom_resolve_plugin` | name | JSON id or `null` |
//! | `loom_call_plugin` | JSON `CrossCallRequest` | JSON `CrossCallResponse` |
//! | `loom_list_plugins` | `all` or `active` | JSON array of `PluginInfo` |
//! | `loom_log` | level, message | none |
//!
//! The plugin functions reach other plugins only through the
//! [`PluginContext`] handed to this instance at activation. Before that, or
//! for throwaway instances, they behave as if no other plugin exists.

use std::sync::{Arc, OnceLock};

use extism::{CurrentPlugin, Error, PTR, UserData, Val};
use loom_abi::{CrossCallRequest, CrossCallResponse, ListScope, PluginInfo, host_fns};
use serde_json::Value;
use tracing::debug;

use crate::context::PluginContext;
use crate::id::PluginId;

/// Per-instance state shared with host functions.
pub(super) struct HostState {
    /// Unit name, attached to guest log lines.
    pub(super) unit: String,
    /// Filled by `set_context` at activation.
    pub(super) context: Arc<OnceLock<PluginContext>>,
}

fn snapshot(user_data: &UserData<HostState>) -> Result<(String, Option<PluginContext>), Error> {
    let ud = user_data.get()?;
    let state = ud
        .lock()
        .map_err(|e| Error::msg(format!("host state lock poisoned: {e}")))?;
    Ok((state.unit.clone(), state.context.get().cloned()))
}

fn write_output(plugin: &mut CurrentPlugin, outputs: &mut [Val], text: &str) -> Result<(), Error> {
    let mem = plugin.memory_new(text)?;
    outputs[0] = plugin.memory_to_val(mem);
    Ok(())
}

// ---------------------------------------------------------------------------
// loom_log(level, message)
// ---------------------------------------------------------------------------

#[allow(clippy::needless_pass_by_value)] // Signature required by Extism callback API
fn loom_log_impl(
    plugin: &mut CurrentPlugin,
    inputs: &[Val],
    _outputs: &mut [Val],
    user_data: UserData<HostState>,
) -> Result<(), Error> {
    let level: String = plugin.memory_get_val(&inputs[0])?;
    let message: String = plugin.memory_get_val(&inputs[1])?;
    let (unit, _) = snapshot(&user_data)?;

    match level.to_ascii_lowercase().as_str() {
        "trace" => tracing::trace!(unit = %unit, "{message}"),
        "debug" => tracing::debug!(unit = %unit, "{message}"),
        "warn" => tracing::warn!(unit = %unit, "{message}"),
        "error" => tracing::error!(unit = %unit, "{message}"),
        _ => tracing::info!(unit = %unit, "{message}"),
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// loom_resolve_plugin(name) -> id_json
// ---------------------------------------------------------------------------

#[allow(clippy::needless_pass_by_value)] // Signature required by Extism callback API
fn loom_resolve_plugin_impl(
    plugin: &mut CurrentPlugin,
    inputs: &[Val],
    outputs: &mut [Val],
    user_data: UserData<HostState>,
) -> Result<(), Error> {
    let name: String = plugin.memory_get_val(&inputs[0])?;
    let (unit, context) = snapshot(&user_data)?;

    let resolved = context.and_then(|ctx| ctx.resolve(&name));
    debug!(unit = %unit, target = %name, found = resolved.is_some(), "Guest resolved plugin");

    let result = resolved.map_or(Value::Null, |id| Value::String(id.to_string()));
    write_output(plugin, outputs, &result.to_string())
}

// ---------------------------------------------------------------------------
// loom_call_plugin(request_json) -> response_json
// ---------------------------------------------------------------------------

#[allow(clippy::needless_pass_by_value)] // Signature required by Extism callback API
fn loom_call_plugin_impl(
    plugin: &mut CurrentPlugin,
    inputs: &[Val],
    outputs: &mut [Val],
    user_data: UserData<HostState>,
) -> Result<(), Error> {
    let raw: String = plugin.memory_get_val(&inputs[0])?;
    let (unit, context) = snapshot(&user_data)?;

    let response = match serde_json::from_str::<CrossCallRequest>(&raw) {
        Ok(request) => cross_call(context.as_ref(), &unit, request),
        Err(e) => CrossCallResponse::Error {
            kind: "invalid_request".to_owned(),
            message: format!("malformed cross-plugin request: {e}"),
        },
    };

    let encoded = serde_json::to_string(&response)
        .map_err(|e| Error::msg(format!("failed to encode response: {e}")))?;
    write_output(plugin, outputs, &encoded)
}

fn cross_call(
    context: Option<&PluginContext>,
    unit: &str,
    request: CrossCallRequest,
) -> CrossCallResponse {
    let not_found = || CrossCallResponse::Error {
        kind: "not_found".to_owned(),
        message: format!("plugin not found: {}", request.plugin),
    };

    let (Some(context), Ok(target)) = (context, request.plugin.parse::<PluginId>()) else {
        return not_found();
    };

    debug!(unit = %unit, target = %target, method = %request.method, "Guest cross-plugin call");
    match context.call(target, &request.method, &request.args) {
        Ok(value) => CrossCallResponse::Ok { value },
        Err(e) => CrossCallResponse::Error {
            kind: e.kind().to_string(),
            message: e.to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// loom_list_plugins(scope) -> plugins_json
// ---------------------------------------------------------------------------

#[allow(clippy::needless_pass_by_value)] // Signature required by Extism callback API
fn loom_list_plugins_impl(
    plugin: &mut CurrentPlugin,
    inputs: &[Val],
    outputs: &mut [Val],
    user_data: UserData<HostState>,
) -> Result<(), Error> {
    let scope: String = plugin.memory_get_val(&inputs[0])?;
    let (unit, context) = snapshot(&user_data)?;

    let plugins = list_plugins(context.as_ref(), ListScope::from(scope.as_str()));
    debug!(unit = %unit, scope = %scope, count = plugins.len(), "Guest listed plugins");

    let encoded = serde_json::to_string(&plugins)
        .map_err(|e| Error::msg(format!("failed to encode plugin list: {e}")))?;
    write_output(plugin, outputs, &encoded)
}

fn list_plugins(context: Option<&PluginContext>, scope: ListScope) -> Vec<PluginInfo> {
    context
        .map(PluginContext::plugins)
        .unwrap_or_default()
        .iter()
        .filter(|p| scope.includes(p.active))
        .map(|p| p.to_wire())
        .collect()
}

/// Register the Loom host functions on `builder`.
pub(super) fn register_host_functions(
    builder: extism::PluginBuilder,
    user_data: UserData<HostState>,
) -> extism::PluginBuilder {
    builder
        .with_function(
            host_fns::LOG,
            [PTR, PTR],
            [],
            user_data.clone(),
            loom_log_impl,
        )
        .with_function(
            host_fns::RESOLVE_PLUGIN,
            [PTR],
            [PTR],
            user_data.clone(),
            loom_resolve_plugin_impl,
        )
        .with_function(
            host_fns::CALL_PLUGIN,
            [PTR],
            [PTR],
            user_data.clone(),
            loom_call_plugin_impl,
        )
        .with_function(
            host_fns::LIST_PLUGINS,
            [PTR],
            [PTR],
            user_data,
            loom_list_plugins_impl,
        )
}
