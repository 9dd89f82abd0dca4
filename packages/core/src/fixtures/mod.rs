//! Fixture Provisioning
//!
//! Server-side factory that materializes test-data objects from named
//! specifications and publishes each one at a fresh remote endpoint, so the
//! test body can manipulate the real in-memory object through a handle
//! instead of a serialized copy.

mod catalog;
mod registry;

pub use catalog::{FixtureCatalog, FixtureCtor, FixtureObject};
pub use registry::{FixtureError, FixtureRegistry, RegistryTarget};
