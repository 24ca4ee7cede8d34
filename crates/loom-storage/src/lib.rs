//! Loom Storage: namespaced key-value persistence.
//!
//! The plugin host keeps its durable metadata (plugin records) in a
//! [`KvStore`]. Two backends are provided:
//!
//! - [`MemoryKvStore`], always available, for tests and throwaway hosts
//! - `SurrealKvStore`, behind the **`kv`** feature, an embedded ACID
//!   LSM-tree store that survives process restarts
//!
//! Callers normally bind a namespace once through [`ScopedKvStore`], which
//! also offers typed JSON access.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod kv;

pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, MemoryKvStore, ScopedKvStore};

#[cfg(feature = "kv")]
pub use kv::SurrealKvStore;
