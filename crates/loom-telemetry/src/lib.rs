#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Logging for the Loom plugin host.
//!
//! ```rust,no_run
//! use loom_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Json)
//!     .with_directive("loom_plugins=trace");
//! setup_logging(&config)?;
//! # Ok::<(), loom_telemetry::TelemetryError>(())
//! ```

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{FileRotation, LogConfig, LogFormat, LogTarget, setup_logging};
