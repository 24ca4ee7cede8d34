//! Raw imports of the Loom host functions. See `loom_abi::host_fns`.

use extism_pdk::*;

#[host_fn]
extern "ExtismHost" {
    pub(crate) fn loom_log(level: String, message: String);
    pub(crate) fn loom_resolve_plugin(name: String) -> String;
    pub(crate) fn loom_call_plugin(request: String) -> String;
    pub(crate) fn loom_list_plugins(scope: String) -> String;
}
