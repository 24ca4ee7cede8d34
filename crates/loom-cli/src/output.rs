//! Human or JSON rendering of command results.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Output {
    /// Styled text for a terminal.
    Human,
    /// Pretty-printed JSON.
    Json,
}

impl Output {
    /// Print `value`, using `human` to render it in human mode.
    pub(crate) fn print<T: Serialize>(self, value: &T, human: impl FnOnce(&T) -> String) -> Result<()> {
        match self {
            Self::Json => println!("{}", serde_json::to_string_pretty(value)?),
            Self::Human => println!("{}", human(value)),
        }
        Ok(())
    }
}

/// A returned value as a human reads it: strings bare, everything else as
/// compact JSON.
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A command-line argument as a wire value: JSON where it parses, a plain
/// string otherwise.
pub(crate) fn parse_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_arg_prefers_json() {
        assert_eq!(parse_arg("2"), json!(2));
        assert_eq!(parse_arg("2.5"), json!(2.5));
        assert_eq!(parse_arg("true"), json!(true));
        assert_eq!(parse_arg("[1, 2]"), json!([1, 2]));
        assert_eq!(parse_arg(r#""2""#), json!("2"));
    }

    #[test]
    fn test_parse_arg_falls_back_to_string() {
        assert_eq!(parse_arg("hello"), json!("hello"));
        assert_eq!(parse_arg("hello world"), json!("hello world"));
        assert_eq!(parse_arg("{oops"), json!("{oops"));
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&json!("plain")), "plain");
        assert_eq!(render_value(&json!(4.0)), "4.0");
        assert_eq!(render_value(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(render_value(&Value::Null), "");
    }
}
