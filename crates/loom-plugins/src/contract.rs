//! The extension contract every plugin implements.

use crate::context::PluginContext;
use crate::method::MethodTable;

/// A failure raised by plugin code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ExtensionError(String);

impl ExtensionError {
    /// Create an error with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// The message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for ExtensionError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for ExtensionError {
    fn from(message: &str) -> Self {
        Self(message.to_owned())
    }
}

/// An instantiated plugin.
///
/// The host calls [`set_context`](Self::set_context) at most once, then
/// [`on_activate`](Self::on_activate). Nothing else is invoked before
/// `on_activate` returns, and nothing after
/// [`on_deactivate`](Self::on_deactivate) is called.
///
/// Calls may arrive concurrently from several threads; implementations
/// synchronize their own state.
pub trait Extension: Send + Sync {
    /// Display name, used for name resolution by other plugins.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// The simple text entry point.
    ///
    /// # Errors
    ///
    /// Returns an [`ExtensionError`] when the plugin rejects the input.
    fn execute(&self, input: &str) -> Result<String, ExtensionError>;

    /// Methods invocable by name, built once when the plugin is loaded.
    fn methods(&self) -> &MethodTable;

    /// Receive the cross-plugin context.
    fn set_context(&self, _context: PluginContext) {}

    /// Called once before the plugin serves calls.
    ///
    /// # Errors
    ///
    /// An error aborts activation.
    fn on_activate(&self) -> Result<(), ExtensionError> {
        Ok(())
    }

    /// Called once after the plugin stops serving calls.
    fn on_deactivate(&self) {}
}
