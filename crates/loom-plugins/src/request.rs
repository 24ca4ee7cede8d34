//! Transport-facing request shapes, decided once at the boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::PluginId;

/// A call against one plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PluginRequest {
    /// The simple text entry point.
    Text {
        /// Input text.
        input: String,
    },
    /// A named method with positional arguments.
    Call {
        /// Method name.
        method: String,
        /// Positional wire arguments.
        #[serde(default)]
        args: Vec<Value>,
    },
    /// Positional arguments for `execute`.
    Args {
        /// Positional wire arguments.
        args: Vec<Value>,
    },
}

impl PluginRequest {
    /// A text request.
    #[must_use]
    pub fn text(input: impl Into<String>) -> Self {
        Self::Text {
            input: input.into(),
        }
    }

    /// A named call.
    #[must_use]
    pub fn call(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Call {
            method: method.into(),
            args,
        }
    }
}

/// A plugin addressed by id or by display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginTarget {
    /// By id.
    Id(PluginId),
    /// By case-insensitive display name among active plugins.
    Name(String),
}

impl FromStr for PluginTarget {
    type Err = std::convert::Infallible;

    /// Anything that parses as a UUID is an id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<PluginId>()
            .map_or_else(|_| Self::Name(s.to_owned()), Self::Id))
    }
}

impl From<PluginId> for PluginTarget {
    fn from(id: PluginId) -> Self {
        Self::Id(id)
    }
}

impl fmt::Display for PluginTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}
