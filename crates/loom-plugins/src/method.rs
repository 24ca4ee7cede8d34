//! Per-instance method tables.
//!
//! A [`MethodTable`] maps `(name, arity)` to a typed [`Method`]. It is built
//! once when a plugin loads and replaces runtime introspection: resolution
//! is a map lookup, and the parameter types it stores drive coercion.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use loom_abi::{MethodSpec, ParamType};

use crate::coerce::Arg;
use crate::contract::ExtensionError;

/// Implementation of a declared method. Arguments arrive already coerced
/// to the declared parameter types.
pub type MethodHandler = Arc<dyn Fn(&[Arg]) -> Result<Arg, ExtensionError> + Send + Sync>;

/// Signatures every plugin already has through the [`Extension`](crate::Extension)
/// contract. Tables may not redeclare them.
pub(crate) fn contract_methods() -> [MethodSpec; 3] {
    [
        MethodSpec::new("name").returns(ParamType::String),
        MethodSpec::new("description").returns(ParamType::String),
        MethodSpec::new("execute")
            .param(ParamType::String)
            .returns(ParamType::String),
    ]
}

/// A declared method and its handler.
#[derive(Clone)]
pub struct Method {
    spec: MethodSpec,
    handler: MethodHandler,
}

impl Method {
    /// The declaration.
    #[must_use]
    pub fn spec(&self) -> &MethodSpec {
        &self.spec
    }

    /// Run the handler on coerced arguments.
    ///
    /// # Errors
    ///
    /// Whatever the handler raises.
    pub fn call(&self, args: &[Arg]) -> Result<Arg, ExtensionError> {
        (self.handler)(args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Why a table could not be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MethodTableError {
    /// Two declarations share a name and arity.
    #[error("ambiguous overload: '{name}' with {arity} parameter(s) is declared more than once")]
    Ambiguous {
        /// Method name.
        name: String,
        /// Shared arity.
        arity: usize,
    },
    /// A declaration shadows a contract method.
    #[error("'{name}' with {arity} parameter(s) is reserved by the extension contract")]
    Reserved {
        /// Method name.
        name: String,
        /// Arity.
        arity: usize,
    },
}

/// Lookup table from `(name, arity)` to [`Method`].
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    methods: Vec<Method>,
    index: HashMap<(String, usize), usize>,
}

impl MethodTable {
    /// A table with no declared methods.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a table.
    #[must_use]
    pub fn builder() -> MethodTableBuilder {
        MethodTableBuilder::default()
    }

    /// The method declared as `name` with `arity` parameters.
    #[must_use]
    pub fn get(&self, name: &str, arity: usize) -> Option<&Method> {
        self.index
            .get(&(name.to_owned(), arity))
            .and_then(|&i| self.methods.get(i))
    }

    /// Declared methods in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter()
    }

    /// Number of declared methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether no methods are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Builder for [`MethodTable`].
#[derive(Default)]
pub struct MethodTableBuilder {
    methods: Vec<Method>,
}

impl MethodTableBuilder {
    /// Declare a method.
    #[must_use]
    pub fn method<F>(mut self, spec: MethodSpec, handler: F) -> Self
    where
        F: Fn(&[Arg]) -> Result<Arg, ExtensionError> + Send + Sync + 'static,
    {
        self.methods.push(Method {
            spec,
            handler: Arc::new(handler),
        });
        self
    }

    /// Declare a method with a shared handler.
    #[must_use]
    pub fn method_arc(mut self, spec: MethodSpec, handler: MethodHandler) -> Self {
        self.methods.push(Method { spec, handler });
        self
    }

    /// Finish the table.
    ///
    /// # Errors
    ///
    /// Rejects same-arity overloads and redeclared contract methods, so
    /// resolution never has to choose between candidates.
    pub fn build(self) -> Result<MethodTable, MethodTableError> {
        let reserved = contract_methods();
        let mut index = HashMap::with_capacity(self.methods.len());

        for (i, method) in self.methods.iter().enumerate() {
            let name = method.spec.name.clone();
            let arity = method.spec.arity();

            if reserved
                .iter()
                .any(|r| r.name == name && r.arity() == arity)
            {
                return Err(MethodTableError::Reserved { name, arity });
            }
            if index.insert((name.clone(), arity), i).is_some() {
                return Err(MethodTableError::Ambiguous { name, arity });
            }
        }

        Ok(MethodTable {
            methods: self.methods,
            index,
        })
    }
}

impl fmt::Debug for MethodTableBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodTableBuilder")
            .field("methods", &self.methods.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(args: &[Arg]) -> Result<Arg, ExtensionError> {
        Ok(args.first().cloned().unwrap_or(Arg::Null))
    }

    #[test]
    fn test_lookup_by_name_and_arity() {
        let table = MethodTable::builder()
            .method(MethodSpec::new("greet").returns(ParamType::String), |_| {
                Ok(Arg::from("hi"))
            })
            .method(
                MethodSpec::new("greet")
                    .param(ParamType::String)
                    .returns(ParamType::String),
                echo,
            )
            .build()
            .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("greet", 1).unwrap().spec().arity(), 1);
        assert!(table.get("greet", 2).is_none());
        assert!(table.get("Greet", 0).is_none());
        assert_eq!(
            table.get("greet", 1).unwrap().call(&[Arg::from("x")]),
            Ok(Arg::from("x"))
        );
    }

    #[test]
    fn test_same_arity_overload_rejected() {
        let err = MethodTable::builder()
            .method(MethodSpec::new("add").param(ParamType::Int), echo)
            .method(MethodSpec::new("add").param(ParamType::String), echo)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            MethodTableError::Ambiguous {
                name: "add".into(),
                arity: 1
            }
        );
    }

    #[test]
    fn test_contract_signature_reserved() {
        let err = MethodTable::builder()
            .method(MethodSpec::new("execute").param(ParamType::String), echo)
            .build()
            .unwrap_err();
        assert!(matches!(err, MethodTableError::Reserved { .. }));

        // Same name, different arity, is a separate method.
        assert!(
            MethodTable::builder()
                .method(
                    MethodSpec::new("execute")
                        .param(ParamType::String)
                        .param(ParamType::Int),
                    echo
                )
                .build()
                .is_ok()
        );
    }
}
