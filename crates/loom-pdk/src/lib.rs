//! Guest-side SDK for Loom plugins.
//!
//! A plugin is a `cdylib` built for `wasm32-unknown-unknown` that exports
//! the contract functions and, optionally, a method table.
//!
//! `#[plugin_fn]` expands to `extism_pdk::` paths, so a plugin depends on
//! `extism-pdk` directly next to this crate:
//!
//! ```toml
//! [lib]
//! crate-type = ["cdylib"]
//!
//! [dependencies]
//! loom-pdk = "0.1"
//! extism-pdk = "1.4"
//! ```
//!
//! ```rust,ignore
//! use loom_pdk::prelude::*;
//!
//! #[plugin_fn]
//! pub fn loom_name() -> FnResult<String> {
//!     Ok("Greeter Plugin".into())
//! }
//!
//! #[plugin_fn]
//! pub fn loom_description() -> FnResult<String> {
//!     Ok("Says hello".into())
//! }
//!
//! #[plugin_fn]
//! pub fn loom_execute(input: String) -> FnResult<String> {
//!     Ok(format!("Hello, {input}!"))
//! }
//!
//! #[plugin_fn]
//! pub fn loom_describe() -> FnResult<String> {
//!     describe([MethodSpec::new("greet")
//!         .param(ParamType::String)
//!         .returns(ParamType::String)
//!         .safe("Greets someone by name")])
//! }
//!
//! #[plugin_fn]
//! pub fn greet(input: String) -> FnResult<String> {
//!     let (name,): (String,) = args(&input)?;
//!     ret(format!("Hello, {name}!"))
//! }
//! ```

#![allow(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod context;
pub mod log;
mod sys;

pub use extism_pdk;
pub use loom_abi::{
    CrossCallRequest, CrossCallResponse, ListScope, MethodSpec, ParamType, PluginInfo, exports,
};
pub use serde_json;

use extism_pdk::FnResult;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Everything a plugin usually needs.
pub mod prelude {
    pub use extism_pdk::{FnResult, plugin_fn};
    pub use serde_json::{Value, json};

    pub use crate::{context, log};
    pub use crate::{MethodSpec, ParamType, PluginInfo, args, describe, ret};
}

/// Errors from host calls made through this SDK.
#[derive(Debug, thiserror::Error)]
pub enum PdkError {
    /// The host function itself failed.
    #[error("host call failed: {0}")]
    Host(#[from] extism_pdk::Error),
    /// The host returned something that is not valid JSON.
    #[error("malformed host reply: {0}")]
    Json(#[from] serde_json::Error),
    /// A cross-plugin call was answered with an error.
    #[error("{kind}: {message}")]
    Call {
        /// Failure category, e.g. `not_found`.
        kind: String,
        /// Host-provided message.
        message: String,
    },
}

/// Serialize a method table for the `loom_describe` export.
///
/// # Errors
///
/// Only if serialization fails.
pub fn describe(methods: impl IntoIterator<Item = MethodSpec>) -> FnResult<String> {
    let methods: Vec<MethodSpec> = methods.into_iter().collect();
    Ok(serde_json::to_string(&methods)?)
}

/// Decode a method's positional arguments, e.g. into `(f64, f64)`.
///
/// Arguments arrive already coerced to the declared parameter types.
///
/// # Errors
///
/// If the input does not deserialize into `T`.
pub fn args<T: DeserializeOwned>(input: &str) -> FnResult<T> {
    Ok(serde_json::from_str(input)?)
}

/// Encode a method's return value.
///
/// # Errors
///
/// Only if serialization fails.
pub fn ret<T: Serialize>(value: T) -> FnResult<String> {
    Ok(serde_json::to_string(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_decode_tuple() {
        let (a, b): (f64, f64) = args("[1.5, 2.0]").unwrap();
        assert!((a - 1.5).abs() < f64::EPSILON);
        assert!((b - 2.0).abs() < f64::EPSILON);

        let (items, sep): (Vec<String>, String) = args(r#"[["a","b"], "-"]"#).unwrap();
        assert_eq!(items, vec!["a", "b"]);
        assert_eq!(sep, "-");
    }

    #[test]
    fn test_args_arity_mismatch() {
        assert!(args::<(f64, f64)>("[1.0]").is_err());
    }

    #[test]
    fn test_describe_round_trips_through_abi() {
        let raw = describe([
            MethodSpec::new("add")
                .param(ParamType::Float)
                .param(ParamType::Float)
                .returns(ParamType::Float)
                .safe("Adds two numbers"),
            MethodSpec::new("reset"),
        ])
        .unwrap();

        let specs: Vec<MethodSpec> = serde_json::from_str(&raw).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].arity(), 2);
        assert!(specs[0].is_safe());
        assert_eq!(specs[1].returns, ParamType::Unit);
    }

    #[test]
    fn test_ret_encodes_json() {
        assert_eq!(ret(4.0).unwrap(), "4.0");
        assert_eq!(ret("hi").unwrap(), "\"hi\"");
    }
}
