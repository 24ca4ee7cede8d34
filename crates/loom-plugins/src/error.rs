//! Plugin error types.

use loom_abi::ParamType;
use loom_storage::StorageError;
use serde::Serialize;

use crate::bridge::Surface;
use crate::id::PluginId;

/// Errors from registry, loader and bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// No plugin with this id or name.
    #[error("plugin not found: {0}")]
    NotFound(String),

    /// A lifecycle precondition does not hold.
    #[error("plugin {plugin_id} {message}")]
    InvalidState {
        /// The plugin whose state forbids the operation.
        plugin_id: PluginId,
        /// e.g. "is already active".
        message: String,
    },

    /// The artifact could not produce an instance.
    #[error("failed to load {artifact}: {message}")]
    LoadFailed {
        /// Artifact path or description.
        artifact: String,
        /// Failure reason.
        message: String,
    },

    /// No method with this name and arity on the requested surface.
    #[error("no {surface} method '{method}' taking {arity} argument(s)")]
    MethodNotFound {
        /// Requested method name.
        method: String,
        /// Number of arguments supplied.
        arity: usize,
        /// Surface that was searched.
        surface: Surface,
    },

    /// A wire argument does not fit its parameter type.
    #[error("argument {position} of '{method}' is not a valid {expected}: {message}")]
    ArgumentCoercion {
        /// Method being invoked.
        method: String,
        /// Zero-based argument position.
        position: usize,
        /// Declared parameter type.
        expected: ParamType,
        /// Why the value was rejected.
        message: String,
    },

    /// The plugin's own code failed.
    #[error("'{method}' failed: {message}")]
    Execution {
        /// Method that raised.
        method: String,
        /// Failure reported by the plugin.
        message: String,
    },

    /// The record store failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Artifact I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for PluginError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl PluginError {
    pub(crate) fn invalid_state(plugin_id: PluginId, message: impl Into<String>) -> Self {
        Self::InvalidState {
            plugin_id,
            message: message.into(),
        }
    }

    /// A [`PluginError::LoadFailed`] for `artifact`. For custom loaders.
    #[must_use]
    pub fn load_failed(artifact: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::LoadFailed {
            artifact: artifact.to_string(),
            message: message.into(),
        }
    }

    /// The failure category, for transports that map errors to status codes.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::LoadFailed { .. } => ErrorKind::LoadFailure,
            Self::MethodNotFound { .. } => ErrorKind::MethodNotFound,
            Self::ArgumentCoercion { .. } => ErrorKind::ArgumentCoercion,
            Self::Execution { .. } => ErrorKind::Execution,
            Self::Storage(_) | Self::Io(_) => ErrorKind::Storage,
        }
    }
}

/// Discriminant of [`PluginError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unknown plugin id or name.
    NotFound,
    /// Lifecycle precondition violated.
    InvalidState,
    /// No qualifying extension, or instantiation failed.
    LoadFailure,
    /// No name and arity match on the surface.
    MethodNotFound,
    /// Wire value does not fit the parameter type.
    ArgumentCoercion,
    /// The invoked method raised.
    Execution,
    /// Persistence or artifact I/O failed.
    Storage,
}

impl ErrorKind {
    /// Stable snake_case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidState => "invalid_state",
            Self::LoadFailure => "load_failure",
            Self::MethodNotFound => "method_not_found",
            Self::ArgumentCoercion => "argument_coercion",
            Self::Execution => "execution",
            Self::Storage => "storage",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;
