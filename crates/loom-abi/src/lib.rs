#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Wire-level contract between the Loom host and its WASM plugins.
//!
//! Both sides of the boundary depend on this crate: the host to decode what
//! a guest declares about itself, the guest SDK to produce it. It therefore
//! only depends on `serde` and builds for native and `wasm32` targets alike.
//!
//! # Guest exports
//!
//! | Export | Input | Output |
//! |--------|-------|--------|
//! | [`exports::NAME`] | empty | display name |
//! | [`exports::DESCRIPTION`] | empty | description |
//! | [`exports::EXECUTE`] | text | text |
//! | [`exports::DESCRIBE`] | empty | JSON array of [`MethodSpec`] |
//! | [`exports::ON_ACTIVATE`] / [`exports::ON_DEACTIVATE`] | empty | ignored |
//!
//! Declared methods receive a JSON array of already-coerced arguments and
//! return a single JSON value.

mod call;
mod method;
mod param;

pub use call::{CrossCallRequest, CrossCallResponse, ListScope, PluginInfo};
pub use method::MethodSpec;
pub use param::ParamType;

/// Names of the functions a guest module exports.
pub mod exports {
    /// Returns the plugin's display name.
    pub const NAME: &str = "loom_name";
    /// Returns the plugin's description.
    pub const DESCRIPTION: &str = "loom_description";
    /// The simple text entry point.
    pub const EXECUTE: &str = "loom_execute";
    /// Returns the JSON method table.
    pub const DESCRIBE: &str = "loom_describe";
    /// Optional activation hook.
    pub const ON_ACTIVATE: &str = "loom_on_activate";
    /// Optional deactivation hook.
    pub const ON_DEACTIVATE: &str = "loom_on_deactivate";

    /// Exports every qualifying module must provide.
    pub const REQUIRED: [&str; 3] = [NAME, DESCRIPTION, EXECUTE];
}

/// Names of the host functions available to guests.
pub mod host_fns {
    /// `(name) -> JSON plugin id or null`
    pub const RESOLVE_PLUGIN: &str = "loom_resolve_plugin";
    /// `(JSON CrossCallRequest) -> JSON CrossCallResponse`
    pub const CALL_PLUGIN: &str = "loom_call_plugin";
    /// `(scope) -> JSON array of PluginInfo`, scope being a `ListScope`
    /// wire form
    pub const LIST_PLUGINS: &str = "loom_list_plugins";
    /// `(level, message)`
    pub const LOG: &str = "loom_log";
}
