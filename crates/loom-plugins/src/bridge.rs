//! Name-and-arity method resolution over a loaded extension.
//!
//! Both surfaces share one resolution: collect candidates (the contract
//! methods on the unrestricted surface, then the method table), keep those
//! visible on the surface, then match name, then arity. The surviving
//! method's parameter types drive argument coercion.
//!
//! Plugin code runs inside [`catch_unwind`] so a panicking plugin becomes an
//! [`PluginError::Execution`] instead of taking down the caller.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use loom_abi::{MethodSpec, ParamType};
use serde::Serialize;
use serde_json::Value;

use crate::coerce::{Arg, coerce_args, coerce_return};
use crate::contract::{Extension, ExtensionError};
use crate::error::{PluginError, PluginResult};
use crate::method::contract_methods;

/// Which methods a call may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    /// Every public method, including the contract methods.
    Unrestricted,
    /// Only methods declared safe.
    Safe,
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrestricted => f.write_str("unrestricted"),
            Self::Safe => f.write_str("safe"),
        }
    }
}

/// A method on the unrestricted surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodInfo {
    /// Method name.
    pub name: String,
    /// Parameter type names, in order.
    pub params: Vec<String>,
    /// Return type name.
    pub returns: String,
}

impl fmt::Display for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) -> {}", self.name, self.params.join(", "), self.returns)
    }
}

/// A method on the safe surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafeMethodInfo {
    /// Method name.
    pub name: String,
    /// The author's description.
    pub description: String,
    /// Parameter type names, in order.
    pub params: Vec<String>,
}

fn type_names(params: &[ParamType]) -> Vec<String> {
    params.iter().map(ToString::to_string).collect()
}

/// Every method reachable through [`invoke`] on the unrestricted surface.
#[must_use]
pub fn list_methods(extension: &dyn Extension) -> Vec<MethodInfo> {
    let declared = extension.methods().iter().map(|m| m.spec().clone());
    contract_methods()
        .into_iter()
        .chain(declared)
        .map(|spec| MethodInfo {
            params: type_names(&spec.params),
            returns: spec.returns.to_string(),
            name: spec.name,
        })
        .collect()
}

/// Methods declared safe, with their descriptions.
#[must_use]
pub fn list_safe_methods(extension: &dyn Extension) -> Vec<SafeMethodInfo> {
    extension
        .methods()
        .iter()
        .filter_map(|m| {
            let spec = m.spec();
            spec.safe.as_ref().map(|description| SafeMethodInfo {
                name: spec.name.clone(),
                description: description.clone(),
                params: type_names(&spec.params),
            })
        })
        .collect()
}

/// Call the simple text entry point.
///
/// # Errors
///
/// [`PluginError::Execution`] if the plugin fails or panics.
pub fn execute_simple(extension: &dyn Extension, input: &str) -> PluginResult<String> {
    guarded("execute", || extension.execute(input))
}

/// Resolve `method` on `surface` by name and `args.len()`, coerce the
/// arguments, call it and coerce the result back to the wire.
///
/// # Errors
///
/// - [`PluginError::MethodNotFound`] when nothing on the surface matches
/// - [`PluginError::ArgumentCoercion`] when an argument does not fit
/// - [`PluginError::Execution`] when the method fails or panics
pub fn invoke(
    extension: &dyn Extension,
    method: &str,
    args: &[Value],
    surface: Surface,
) -> PluginResult<Value> {
    let arity = args.len();

    if surface == Surface::Unrestricted
        && let Some(spec) = contract_methods()
            .into_iter()
            .find(|spec| spec.name == method && spec.arity() == arity)
    {
        let coerced = coerce(&spec, args)?;
        let result = guarded(method, || call_contract(extension, &spec.name, &coerced))?;
        return Ok(coerce_return(result, &spec.returns));
    }

    let target = extension
        .methods()
        .get(method, arity)
        .filter(|m| surface == Surface::Unrestricted || m.spec().is_safe())
        .ok_or_else(|| PluginError::MethodNotFound {
            method: method.to_owned(),
            arity,
            surface,
        })?;

    let coerced = coerce(target.spec(), args)?;
    let result = guarded(method, || target.call(&coerced))?;
    Ok(coerce_return(result, &target.spec().returns))
}

fn coerce(spec: &MethodSpec, args: &[Value]) -> PluginResult<Vec<Arg>> {
    coerce_args(args, &spec.params).map_err(|e| PluginError::ArgumentCoercion {
        method: spec.name.clone(),
        position: e.position,
        expected: e.expected,
        message: e.message,
    })
}

fn call_contract(
    extension: &dyn Extension,
    name: &str,
    args: &[Arg],
) -> Result<Arg, ExtensionError> {
    match (name, args) {
        ("name", []) => Ok(Arg::from(extension.name())),
        ("description", []) => Ok(Arg::from(extension.description())),
        ("execute", [input]) => extension
            .execute(input.as_str().unwrap_or_default())
            .map(Arg::Str),
        _ => Err(ExtensionError::new(format!("no contract method '{name}'"))),
    }
}

/// Run plugin code, mapping its failures and panics to
/// [`PluginError::Execution`].
pub(crate) fn guarded<T>(
    method: &str,
    f: impl FnOnce() -> Result<T, ExtensionError>,
) -> PluginResult<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(PluginError::Execution {
            method: method.to_owned(),
            message: e.to_string(),
        }),
        Err(payload) => Err(PluginError::Execution {
            method: method.to_owned(),
            message: format!("plugin panicked: {}", panic_message(payload.as_ref())),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use loom_abi::MethodSpec;
    use serde_json::json;

    use super::*;
    use crate::method::MethodTable;

    struct Calc {
        methods: MethodTable,
    }

    impl Calc {
        fn new() -> Self {
            let methods = MethodTable::builder()
                .method(
                    MethodSpec::new("add")
                        .param(ParamType::Float)
                        .param(ParamType::Float)
                        .returns(ParamType::Float)
                        .safe("Adds two numbers"),
                    |args| {
                        let a = args[0].as_f64().unwrap_or_default();
                        let b = args[1].as_f64().unwrap_or_default();
                        Ok(Arg::Float(a + b))
                    },
                )
                .method(
                    MethodSpec::new("echo")
                        .param(ParamType::String)
                        .returns(ParamType::String),
                    |args| Ok(args[0].clone()),
                )
                .method(MethodSpec::new("fail"), |_| Err("boom".into()))
                .method(MethodSpec::new("explode"), |_| panic!("kaboom"))
                .build()
                .unwrap();
            Self { methods }
        }
    }

    impl Extension for Calc {
        fn name(&self) -> &str {
            "Calc"
        }

        fn description(&self) -> &str {
            "Arithmetic"
        }

        fn execute(&self, input: &str) -> Result<String, ExtensionError> {
            Ok(format!("calc:{input}"))
        }

        fn methods(&self) -> &MethodTable {
            &self.methods
        }
    }

    #[test]
    fn test_invoke_declared_method() {
        let calc = Calc::new();
        let result = invoke(&calc, "add", &[json!(2), json!(2)], Surface::Unrestricted).unwrap();
        assert_eq!(result, json!(4.0));
        let result = invoke(&calc, "echo", &[json!("hello")], Surface::Unrestricted).unwrap();
        assert_eq!(result, json!("hello"));
    }

    #[test]
    fn test_contract_methods_unrestricted_only() {
        let calc = Calc::new();
        assert_eq!(
            invoke(&calc, "name", &[], Surface::Unrestricted).unwrap(),
            json!("Calc")
        );
        assert_eq!(
            invoke(&calc, "execute", &[json!(7)], Surface::Unrestricted).unwrap(),
            json!("calc:7")
        );
        let err = invoke(&calc, "name", &[], Surface::Safe).unwrap_err();
        assert!(matches!(err, PluginError::MethodNotFound { .. }));
    }

    #[test]
    fn test_arity_and_name_must_match() {
        let calc = Calc::new();
        let err = invoke(&calc, "add", &[json!(1)], Surface::Unrestricted).unwrap_err();
        assert!(matches!(err, PluginError::MethodNotFound { arity: 1, .. }));
        let err = invoke(&calc, "ADD", &[json!(1), json!(2)], Surface::Unrestricted).unwrap_err();
        assert!(matches!(err, PluginError::MethodNotFound { .. }));
    }

    #[test]
    fn test_safe_surface_hides_unmarked_methods() {
        let calc = Calc::new();
        let err = invoke(&calc, "echo", &[json!("x")], Surface::Safe).unwrap_err();
        assert!(matches!(
            err,
            PluginError::MethodNotFound {
                surface: Surface::Safe,
                ..
            }
        ));
        assert_eq!(
            invoke(&calc, "add", &[json!(1.5), json!("2")], Surface::Safe).unwrap(),
            json!(3.5)
        );
    }

    #[test]
    fn test_coercion_failure_reports_position() {
        let calc = Calc::new();
        let err = invoke(&calc, "add", &[json!("x"), json!(2)], Surface::Unrestricted).unwrap_err();
        match err {
            PluginError::ArgumentCoercion {
                method,
                position,
                expected,
                ..
            } => {
                assert_eq!(method, "add");
                assert_eq!(position, 0);
                assert_eq!(expected, ParamType::Float);
            },
            other => panic!("expected ArgumentCoercion, got {other:?}"),
        }
    }

    #[test]
    fn test_failures_and_panics_become_execution_errors() {
        let calc = Calc::new();
        let err = invoke(&calc, "fail", &[], Surface::Unrestricted).unwrap_err();
        assert!(matches!(err, PluginError::Execution { ref message, .. } if message == "boom"));

        let err = invoke(&calc, "explode", &[], Surface::Unrestricted).unwrap_err();
        assert!(
            matches!(err, PluginError::Execution { ref message, .. } if message.contains("kaboom"))
        );
    }

    #[test]
    fn test_listings() {
        let calc = Calc::new();
        let all: Vec<String> = list_methods(&calc).iter().map(ToString::to_string).collect();
        assert_eq!(
            all,
            vec![
                "name() -> string",
                "description() -> string",
                "execute(string) -> string",
                "add(float, float) -> float",
                "echo(string) -> string",
                "fail() -> unit",
                "explode() -> unit",
            ]
        );

        let safe = list_safe_methods(&calc);
        assert_eq!(safe.len(), 1);
        assert_eq!(safe[0].name, "add");
        assert_eq!(safe[0].description, "Adds two numbers");
        assert_eq!(safe[0].params, vec!["float", "float"]);
    }

    #[test]
    fn test_execute_simple() {
        let calc = Calc::new();
        assert_eq!(execute_simple(&calc, "hi").unwrap(), "calc:hi");
    }
}
