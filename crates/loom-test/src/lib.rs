//! Loom Test - shared fixtures for the plugin host.
//!
//! Native extensions stand in for compiled artifacts: an artifact whose
//! content is `loom-fixture:<kind>` loads as the fixture of that kind
//! through [`FixtureLoader`]. [`TestHost`] wires a registry over an
//! in-memory record store and a temporary artifact directory, with
//! [`FlakyStore`] to fail record saves on demand.
//!
//! ```rust,ignore
//! use loom_test::{Fixture, TestHost};
//!
//! #[tokio::test]
//! async fn test_echo() {
//!     let host = TestHost::new().await;
//!     let id = host.upload_active(Fixture::Echo).await;
//!     let out = host.registry.invoke(id, "echo", vec!["hi".into()]).await.unwrap();
//!     assert_eq!(out, "hi");
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod extensions;
pub mod harness;
pub mod loader;
pub mod store;

pub use extensions::{Fixture, HookLog};
pub use harness::{TestHost, setup_test_logging};
pub use loader::{FixtureLoader, fixture_artifact};
pub use store::FlakyStore;
