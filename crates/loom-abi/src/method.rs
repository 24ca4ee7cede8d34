use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ParamType;

/// Declaration of one invocable plugin method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSpec {
    /// Method name as callers address it.
    pub name: String,
    /// Positional parameter types.
    #[serde(default)]
    pub params: Vec<ParamType>,
    /// Return type.
    #[serde(default = "unit")]
    pub returns: ParamType,
    /// Present when the method is exposed on the safe surface. Holds the
    /// author's description of what it does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe: Option<String>,
    /// Guest export implementing the method. Defaults to [`name`](Self::name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<String>,
}

fn unit() -> ParamType {
    ParamType::Unit
}

impl MethodSpec {
    /// A method with no parameters returning nothing.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: ParamType::Unit,
            safe: None,
            export: None,
        }
    }

    /// Append a positional parameter.
    #[must_use]
    pub fn param(mut self, ty: ParamType) -> Self {
        self.params.push(ty);
        self
    }

    /// Set the return type.
    #[must_use]
    pub fn returns(mut self, ty: ParamType) -> Self {
        self.returns = ty;
        self
    }

    /// Mark the method safe, with a human-readable description.
    #[must_use]
    pub fn safe(mut self, description: impl Into<String>) -> Self {
        self.safe = Some(description.into());
        self
    }

    /// Bind the method to a differently named guest export.
    #[must_use]
    pub fn export(mut self, export: impl Into<String>) -> Self {
        self.export = Some(export.into());
        self
    }

    /// Number of positional parameters.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Whether the method is exposed on the safe surface.
    #[must_use]
    pub fn is_safe(&self) -> bool {
        self.safe.is_some()
    }

    /// The guest export to call for this method.
    #[must_use]
    pub fn export_name(&self) -> &str {
        self.export.as_deref().unwrap_or(&self.name)
    }
}

/// Renders the signature, e.g. `add(float, float) -> float`.
impl fmt::Display for MethodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ") -> {}", self.returns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_signature() {
        let spec = MethodSpec::new("add")
            .param(ParamType::Float)
            .param(ParamType::Float)
            .returns(ParamType::Float)
            .safe("Adds two numbers");

        assert_eq!(spec.arity(), 2);
        assert!(spec.is_safe());
        assert_eq!(spec.export_name(), "add");
        assert_eq!(spec.to_string(), "add(float, float) -> float");
    }

    #[test]
    fn test_deserialize_minimal() {
        let spec: MethodSpec = serde_json::from_str(r#"{"name": "ping"}"#).unwrap();
        assert!(spec.params.is_empty());
        assert_eq!(spec.returns, ParamType::Unit);
        assert!(!spec.is_safe());
    }

    #[test]
    fn test_export_override() {
        let spec: MethodSpec =
            serde_json::from_str(r#"{"name": "join", "params": [{"list": "string"}, "string"], "returns": "string", "export": "string_join"}"#)
                .unwrap();
        assert_eq!(spec.export_name(), "string_join");
        assert_eq!(spec.to_string(), "join(list<string>, string) -> string");
    }
}
