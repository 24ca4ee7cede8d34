//! Loom plugin host core.
//!
//! Loads externally supplied code at runtime, exposes its methods to
//! loosely typed callers, and manages its lifecycle next to concurrent
//! invocation traffic:
//!
//! - [`Extension`]: the contract every plugin implements, with its
//!   [`MethodTable`] of invocable methods
//! - [`coerce`]: wire values to declared parameter types and back
//! - [`loader`]: artifacts to isolated instances ([`WasmArtifactLoader`])
//! - [`bridge`]: name-and-arity resolution on the unrestricted and safe
//!   surfaces
//! - [`PluginRegistry`]: records, live instances and lifecycle transitions
//! - [`PluginContext`]: how one active plugin reaches another, and sees
//!   the list of uploaded plugins
//!
//! # Lifecycle
//!
//! ```text
//! upload ──▶ Registered ──activate──▶ Active
//!               ▲   │                   │
//!               │   remove          deactivate
//!               │   ▼                   │
//!               │ <gone>                │
//!               └───────────────────────┘
//! ```
//!
//! Durable records live in a [`PluginStore`], artifacts in an
//! [`ArtifactStore`]. Both are traits so transports can bring their own.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod artifact;
pub mod bridge;
pub mod catalog;
pub mod coerce;
pub mod context;
pub mod contract;
pub mod error;
pub mod id;
mod live;
pub mod loader;
pub mod method;
pub mod registry;
pub mod request;
pub mod store;

pub use artifact::{ArtifactStore, FsArtifactStore};
pub use bridge::{MethodInfo, SafeMethodInfo, Surface};
pub use catalog::PluginSummary;
pub use coerce::Arg;
pub use context::PluginContext;
pub use contract::{Extension, ExtensionError};
pub use error::{ErrorKind, PluginError, PluginResult};
pub use id::PluginId;
pub use loader::{ArtifactLoader, CodeSpace, LoadedPlugin, WasmArtifactLoader};
pub use method::{Method, MethodTable, MethodTableBuilder, MethodTableError};
pub use registry::{DEFAULT_METHOD, PluginRegistry, StartupReport};
pub use request::{PluginRequest, PluginTarget};
pub use store::{KvPluginStore, NewPluginRecord, PluginRecord, PluginStore};

pub use loom_abi::{MethodSpec, ParamType};
