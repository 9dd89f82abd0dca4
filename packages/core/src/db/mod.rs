//! Database Layer
//!
//! Connection pinning and remote transaction control over libsql.
//!
//! The harness forces the server to hand out exactly one connection to all
//! request handlers, then drives BEGIN/ROLLBACK on that connection from the
//! test-driver process. Everything here is deliberately explicit: the pin is
//! a value passed to every component that needs it, never ambient global
//! state.

mod error;
mod pin;
mod transaction;

pub use error::DatabaseError;
pub use pin::ConnectionPin;
pub use transaction::{
    PinnedResource, TransactionController, TransactionError, TransactionalResource,
};
