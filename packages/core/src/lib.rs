//! txharness Core Library
//!
//! Remote transactional test harness: a test-driver process remotely commands
//! a server process to pin a single database connection, wrap each test in a
//! transaction that is rolled back afterwards, and materialize fixture objects
//! at fresh remote endpoints.
//!
//! # Architecture
//!
//! - **Pinned connection**: one `libsql` connection deliberately shared by all
//!   request handlers, so its transaction state is controllable from outside
//! - **JSON-RPC 2.0 over TCP**: newline-delimited requests/responses, one
//!   endpoint per published object
//! - **Fixture registry**: specification key -> constructor mapping resolved
//!   at startup; each instance is published at a never-reused address
//! - **Lifecycle driver**: per-run server start/readiness/stop, per-test
//!   begin/rollback with rollback guaranteed on every exit path
//!
//! # Modules
//!
//! - [`config`] - Harness configuration (well-known addresses, timeouts)
//! - [`db`] - Connection pin and transaction control
//! - [`rpc`] - Wire types, endpoint publishing, client-side remote handles
//! - [`fixtures`] - Fixture catalog and registry
//! - [`driver`] - Test lifecycle orchestration

pub mod config;
pub mod db;
pub mod driver;
pub mod fixtures;
pub mod rpc;

// Re-export commonly used types
pub use config::HarnessConfig;
pub use db::{ConnectionPin, DatabaseError, TransactionController, TransactionError};
pub use driver::{DriverError, RunState, ServerSupervisor, TestContext, TestLifecycleDriver};
pub use fixtures::{FixtureCatalog, FixtureError, FixtureObject, FixtureRegistry};
pub use rpc::{RemoteError, RemoteHandle, RpcError, RpcRequest, RpcResponse, RpcTarget};
