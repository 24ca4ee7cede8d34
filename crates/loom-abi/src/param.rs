use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared type of a method parameter or return value.
///
/// Serialized in lowercase, with containers as single-key maps:
/// `"int"`, `{"list": "string"}`, `{"optional": "float"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// `true` / `false`.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// UTF-8 text.
    String,
    /// Homogeneous sequence.
    List(Box<ParamType>),
    /// JSON object with arbitrary values.
    Map,
    /// Any JSON value, passed through untouched.
    Json,
    /// The inner type, or null.
    Optional(Box<ParamType>),
    /// No value. Only meaningful as a return type.
    Unit,
}

impl ParamType {
    /// `list<inner>`.
    #[must_use]
    pub fn list(inner: ParamType) -> Self {
        Self::List(Box::new(inner))
    }

    /// `optional<inner>`.
    #[must_use]
    pub fn optional(inner: ParamType) -> Self {
        Self::Optional(Box::new(inner))
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::String => f.write_str("string"),
            Self::List(inner) => write!(f, "list<{inner}>"),
            Self::Map => f.write_str("map"),
            Self::Json => f.write_str("json"),
            Self::Optional(inner) => write!(f, "optional<{inner}>"),
            Self::Unit => f.write_str("unit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_nested() {
        let ty = ParamType::list(ParamType::optional(ParamType::Int));
        assert_eq!(ty.to_string(), "list<optional<int>>");
    }

    #[test]
    fn test_serde_shape() {
        assert_eq!(serde_json::to_string(&ParamType::Float).unwrap(), "\"float\"");
        assert_eq!(
            serde_json::to_string(&ParamType::list(ParamType::String)).unwrap(),
            r#"{"list":"string"}"#
        );

        let parsed: ParamType = serde_json::from_str(r#"{"optional":"bool"}"#).unwrap();
        assert_eq!(parsed, ParamType::optional(ParamType::Bool));
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_json::from_str::<ParamType>("\"decimal\"").is_err());
    }
}
