//! Connection Pinning
//!
//! Intercepts "acquire a connection" on the server side and returns the same
//! `libsql::Connection` to every caller, so all request handlers share one
//! transaction scope that the remote driver can control.
//!
//! # Connection sharing
//!
//! A `libsql::Connection` is a cloneable handle onto one underlying SQLite
//! connection; cloning it does not open a second connection. The pin caches
//! the handle from the first successful checkout and hands out clones from
//! then on, regardless of which task or thread asks.
//!
//! # Lifecycle
//!
//! Created once at server startup in test mode. The pinned connection is
//! established lazily on the first checkout, lives for the process lifetime,
//! and is never explicitly closed by the harness.

use crate::db::error::DatabaseError;
use libsql::{Connection, Database};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Forces every pool checkout to return one shared connection
///
/// # Examples
///
/// ```no_run
/// use txharness_core::db::ConnectionPin;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = libsql::Builder::new_local(":memory:").build().await?;
///     let pin = ConnectionPin::new(Arc::new(db));
///     let a = pin.checkout().await?;
///     let b = pin.checkout().await?;
///     // `a` and `b` alias the same underlying connection
///     Ok(())
/// }
/// ```
pub struct ConnectionPin {
    db: Arc<Database>,
    pinned: Mutex<Option<Connection>>,
}

impl ConnectionPin {
    /// Create an unset pin over the given database
    ///
    /// No connection is opened until the first [`checkout`](Self::checkout).
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            pinned: Mutex::new(None),
        }
    }

    /// Check out the pinned connection, establishing it on first use
    ///
    /// Idempotent: every call after the first returns a clone of the same
    /// underlying connection. Concurrent callers serialize on the pin lock,
    /// so exactly one of them establishes the pin.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::PinFailed`] if the initial connect fails.
    /// The pin stays unset in that case; a later checkout may succeed and
    /// establish it.
    pub async fn checkout(&self) -> Result<Connection, DatabaseError> {
        let mut slot = self.pinned.lock().await;

        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self.db.connect().map_err(DatabaseError::pin_failed)?;

        // Concurrent handlers wait and retry instead of failing with
        // SQLITE_BUSY while they share the one connection.
        execute_pragma(&conn, "PRAGMA busy_timeout = 5000").await?;

        info!("📌 Pinned database connection established");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    /// Whether the pin has been established
    pub async fn is_pinned(&self) -> bool {
        self.pinned.lock().await.is_some()
    }
}

/// Execute a PRAGMA statement
///
/// PRAGMA statements return rows, so we must use query() instead of execute().
async fn execute_pragma(conn: &Connection, pragma: &str) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(pragma).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to prepare '{}': {}", pragma, e))
    })?;
    let _ = stmt.query(()).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
    })?;
    debug!("Applied {}", pragma);
    Ok(())
}

#[cfg(test)]
#[path = "pin_test.rs"]
mod pin_test;
