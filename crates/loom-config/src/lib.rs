#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Configuration for the Loom plugin host.
//!
//! # Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Environment** (`LOOM_HOME`, `LOOM_STORE`, `LOOM_LOG_LEVEL`, `LOOM_LOG_FORMAT`)
//! 2. **Explicit file** (`--config <path>`)
//! 3. **User** (`~/.loom/config.toml`, or `<home>/config.toml` when a home is given)
//! 4. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! This crate has no dependencies on other loom crates.

/// Configuration error types.
pub mod error;
/// File discovery and layered loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use types::*;

impl Config {
    /// Load with the full precedence chain.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a file is unreadable or malformed, an
    /// environment variable is invalid, or the result fails validation.
    pub fn load(
        explicit: Option<&std::path::Path>,
        home: Option<&std::path::Path>,
    ) -> ConfigResult<Self> {
        loader::load(explicit, home)
    }
}
