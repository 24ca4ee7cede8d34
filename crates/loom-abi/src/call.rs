use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A guest's request to invoke a method on another active plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossCallRequest {
    /// Target plugin id, as returned by the resolve host function.
    pub plugin: String,
    /// Method name on the target.
    pub method: String,
    /// Positional wire arguments.
    #[serde(default)]
    pub args: Vec<Value>,
}

/// Host reply to a [`CrossCallRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CrossCallResponse {
    /// The call returned a value.
    Ok {
        /// The coerced return value.
        value: Value,
    },
    /// The call failed.
    Error {
        /// Failure category, e.g. `not_found` or `execution`.
        kind: String,
        /// Human-readable message.
        message: String,
    },
}

impl CrossCallResponse {
    /// Convert into a `Result`, pairing kind and message on failure.
    ///
    /// # Errors
    ///
    /// Returns `(kind, message)` for [`CrossCallResponse::Error`].
    pub fn into_result(self) -> Result<Value, (String, String)> {
        match self {
            Self::Ok { value } => Ok(value),
            Self::Error { kind, message } => Err((kind, message)),
        }
    }
}

/// One plugin record as a guest sees it through the list host function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin id, usable with the call host function while active.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Whether the plugin is active.
    pub active: bool,
}

/// Which records the list host function returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListScope {
    /// Every uploaded plugin.
    #[default]
    All,
    /// Active plugins only.
    Active,
}

impl ListScope {
    /// The wire form passed to the host.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Active => "active",
        }
    }

    /// Whether a plugin in state `active` falls in this scope.
    #[must_use]
    pub fn includes(self, active: bool) -> bool {
        active || self == Self::All
    }
}

impl From<&str> for ListScope {
    /// Anything but `active` means [`ListScope::All`].
    fn from(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("active") {
            Self::Active
        } else {
            Self::All
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_tagging() {
        let ok = CrossCallResponse::Ok {
            value: Value::from("HELLO"),
        };
        assert_eq!(
            serde_json::to_string(&ok).unwrap(),
            r#"{"status":"ok","value":"HELLO"}"#
        );

        let err: CrossCallResponse =
            serde_json::from_str(r#"{"status":"error","kind":"not_found","message":"gone"}"#)
                .unwrap();
        assert_eq!(
            err.into_result(),
            Err(("not_found".to_owned(), "gone".to_owned()))
        );
    }

    #[test]
    fn test_request_args_default() {
        let req: CrossCallRequest =
            serde_json::from_str(r#"{"plugin": "abc", "method": "name"}"#).unwrap();
        assert!(req.args.is_empty());
    }

    #[test]
    fn test_list_scope_wire_form() {
        assert_eq!(ListScope::from("active"), ListScope::Active);
        assert_eq!(ListScope::from(" ACTIVE "), ListScope::Active);
        assert_eq!(ListScope::from(""), ListScope::All);
        assert_eq!(ListScope::from(ListScope::All.as_str()), ListScope::All);
        assert!(ListScope::All.includes(false));
        assert!(!ListScope::Active.includes(false));
        assert!(ListScope::Active.includes(true));
    }

    #[test]
    fn test_plugin_info_description_default() {
        let info: PluginInfo =
            serde_json::from_str(r#"{"id": "x", "name": "Echo", "active": true}"#).unwrap();
        assert!(info.description.is_empty());
        assert!(info.active);
    }
}
