//! Remote Transaction Control
//!
//! Begin/rollback operations on the pinned connection with nesting-depth
//! tracking, exposed to the remote driver through
//! [`crate::rpc::control::ControlTarget`].
//!
//! # Nesting
//!
//! Re-entrant test helpers may call begin while a transaction is already
//! open. The controller keeps a nesting counter: the underlying resource
//! sees exactly one BEGIN on the 0->1 transition and exactly one ROLLBACK on
//! the 1->0 transition, never in between. An unmatched rollback is reported
//! as [`TransactionError::Unbalanced`] rather than silently ignored.
//!
//! The harness does not enforce begin/rollback pairing across tests; an
//! unmatched begin leaks an open transaction into the next test. That hazard
//! is the driver's to avoid (it rolls back on every exit path).

use crate::db::error::DatabaseError;
use crate::db::pin::ConnectionPin;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Transaction control errors
#[derive(Error, Debug)]
pub enum TransactionError {
    /// Rollback called with nesting depth already 0
    #[error("Unbalanced transaction: rollback without matching begin")]
    Unbalanced,

    /// The underlying resource rejected the begin/rollback statement
    #[error("Transaction operation failed: {0}")]
    Resource(#[from] DatabaseError),
}

/// Abstract transactional resource
///
/// Begin and rollback are the only operations the controller needs; it makes
/// no assumption about pool-internal state beyond them. Implemented by
/// [`PinnedResource`] for libsql and by recording mocks in tests.
#[async_trait]
pub trait TransactionalResource: Send + Sync {
    /// Open a transaction on the resource
    async fn begin(&self) -> Result<(), DatabaseError>;

    /// Roll back the open transaction
    async fn rollback(&self) -> Result<(), DatabaseError>;
}

/// Transactional resource backed by the pinned libsql connection
pub struct PinnedResource {
    pin: Arc<ConnectionPin>,
}

impl PinnedResource {
    pub fn new(pin: Arc<ConnectionPin>) -> Self {
        Self { pin }
    }
}

#[async_trait]
impl TransactionalResource for PinnedResource {
    async fn begin(&self) -> Result<(), DatabaseError> {
        let conn = self.pin.checkout().await?;
        conn.execute("BEGIN", ())
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to begin: {}", e)))?;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DatabaseError> {
        let conn = self.pin.checkout().await?;
        conn.execute("ROLLBACK", ())
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to rollback: {}", e)))?;
        Ok(())
    }
}

/// Nesting state for the pinned connection's transaction
///
/// `joinable` is cleared while a harness transaction is open so inner
/// application code cannot treat it as its own to commit.
#[derive(Debug)]
struct TransactionState {
    depth: u32,
    joinable: bool,
}

/// Tracks nesting depth and drives the underlying resource
///
/// All transaction state changes go through this controller; since every
/// handler shares the pinned connection, a change is immediately visible to
/// all in-flight requests. That is intentional: it is how the harness
/// achieves global rollback.
pub struct TransactionController {
    resource: Arc<dyn TransactionalResource>,
    state: Mutex<TransactionState>,
}

impl TransactionController {
    pub fn new(resource: Arc<dyn TransactionalResource>) -> Self {
        Self {
            resource,
            state: Mutex::new(TransactionState {
                depth: 0,
                joinable: true,
            }),
        }
    }

    /// Begin a transaction, returning the new nesting depth
    ///
    /// Issues the underlying begin only on the 0->1 transition. Calling twice
    /// in a row yields depth 2, not an error.
    pub async fn begin(&self) -> Result<u32, TransactionError> {
        let mut state = self.state.lock().await;

        if state.depth == 0 {
            self.resource.begin().await?;
            state.joinable = false;
            info!("🔒 Transaction opened on pinned connection");
        }

        state.depth += 1;
        debug!("Transaction depth now {}", state.depth);
        Ok(state.depth)
    }

    /// Roll back, returning the remaining nesting depth
    ///
    /// Issues the underlying rollback only when the depth reaches 0 again.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::Unbalanced`] when called with depth
    /// already 0. The pinned connection is left untouched and stays usable.
    pub async fn rollback(&self) -> Result<u32, TransactionError> {
        let mut state = self.state.lock().await;

        if state.depth == 0 {
            warn!("⚠️  Rollback requested with no open transaction");
            return Err(TransactionError::Unbalanced);
        }

        state.depth -= 1;

        if state.depth == 0 {
            self.resource.rollback().await?;
            state.joinable = true;
            info!("🔓 Transaction rolled back on pinned connection");
        }

        debug!("Transaction depth now {}", state.depth);
        Ok(state.depth)
    }

    /// Current nesting depth
    pub async fn depth(&self) -> u32 {
        self.state.lock().await.depth
    }

    /// Whether the connection is free for application-level transactions
    pub async fn is_joinable(&self) -> bool {
        self.state.lock().await.joinable
    }
}

#[cfg(test)]
#[path = "transaction_test.rs"]
mod transaction_test;
