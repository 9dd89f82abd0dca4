//! Test Lifecycle Orchestration
//!
//! Client-side driver for one test run: start the server under test, wait
//! for readiness, resolve the control and registry handles once, then wrap
//! each test body in beginTransaction/rollbackTransaction. The rollback runs
//! on every exit path from the test body: success, failure, or panic.
//!
//! Per-run state machine:
//!
//! ```text
//! NotStarted -> ServerStarting -> ServerReady
//!     -> (TxBegun -> TxRolledBack)*  (one cycle per test)
//!     -> ServerStopping -> Stopped
//! ```
//!
//! Tests run strictly sequentially: the driver takes `&mut self` for the
//! whole of a test, so test N+1's transaction cannot begin before test N's
//! rollback completed.

mod supervisor;

pub use supervisor::{wait_until_ready, ServerSupervisor};

use crate::config::HarnessConfig;
use crate::rpc::client::{RemoteError, RemoteHandle};
use crate::rpc::types::UNBALANCED_TRANSACTION;
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// Driver-side errors
#[derive(Error, Debug)]
pub enum DriverError {
    /// A remote call failed (transport or remote execution origin; see
    /// [`RemoteError::is_remote`])
    #[error("Remote call failed: {0}")]
    Remote(#[from] RemoteError),

    /// The server answered rollback with the unbalanced-transaction code
    #[error("Unbalanced transaction: rollback without matching begin")]
    UnbalancedTransaction,

    /// The server never accepted connections within the readiness timeout
    #[error("Server at {addr} not ready after {waited:?}: {last_error}")]
    ServerNotReady {
        addr: SocketAddr,
        waited: Duration,
        last_error: String,
    },

    /// The external supervisor failed to start or stop the server
    #[error("Supervisor operation failed: {0}")]
    Supervisor(String),

    /// The test body returned an error (description only; the chain is
    /// flattened the same way remote errors are)
    #[error("Test failed: {0}")]
    TestFailed(String),

    /// The test body panicked (the rollback still ran)
    #[error("Test panicked: {0}")]
    TestPanicked(String),

    /// The registry returned an address that does not parse
    #[error("Invalid remote address: {0}")]
    InvalidAddress(String),

    /// Operation called in the wrong lifecycle state
    #[error("Invalid lifecycle state: expected {expected}, was {actual:?}")]
    InvalidState {
        expected: &'static str,
        actual: RunState,
    },
}

/// Lifecycle state of one test run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    ServerStarting,
    ServerReady,
    TxBegun,
    TxRolledBack,
    ServerStopping,
    Stopped,
}

/// Handles a test body needs: the registry, and through it, fixtures
///
/// Cheap to clone into the spawned test task.
#[derive(Clone, Debug)]
pub struct TestContext {
    registry: RemoteHandle,
}

impl TestContext {
    /// Handle to the fixture registry's well-known endpoint
    pub fn registry(&self) -> &RemoteHandle {
        &self.registry
    }

    /// Create a fixture instance and resolve a handle to it
    ///
    /// An unknown specification is a fatal setup error; callers should not
    /// retry it.
    pub async fn create_fixture(&self, spec: &str) -> Result<RemoteHandle, DriverError> {
        let result = self
            .registry
            .invoke("createFixtureInstance", json!({ "spec": spec }))
            .await?;

        let addr = result
            .get("address")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::InvalidAddress("missing address field".to_string()))?;
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| DriverError::InvalidAddress(format!("{}: {}", addr, e)))?;

        Ok(RemoteHandle::resolve(addr))
    }
}

/// Per-run orchestration of server lifecycle and per-test transactions
pub struct TestLifecycleDriver<S: ServerSupervisor> {
    supervisor: S,
    config: HarnessConfig,
    state: RunState,
    control: Option<RemoteHandle>,
    registry: Option<RemoteHandle>,
}

impl<S: ServerSupervisor> TestLifecycleDriver<S> {
    /// Create a driver that has not started anything yet
    pub fn new(supervisor: S, config: HarnessConfig) -> Self {
        Self {
            supervisor,
            config,
            state: RunState::NotStarted,
            control: None,
            registry: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Start the server under test and resolve the well-known handles
    ///
    /// Polls the control endpoint until it accepts connections, then binds
    /// the control and registry handles for the rest of the run.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<(), DriverError> {
        if self.state != RunState::NotStarted {
            return Err(DriverError::InvalidState {
                expected: "NotStarted",
                actual: self.state,
            });
        }

        self.state = RunState::ServerStarting;
        info!("🚀 Starting server under test");
        self.supervisor
            .start()
            .await
            .map_err(|e| DriverError::Supervisor(format!("{:#}", e)))?;

        wait_until_ready(
            self.config.control_addr,
            self.config.readiness_timeout,
            self.config.readiness_poll_interval,
        )
        .await?;

        self.control = Some(RemoteHandle::resolve(self.config.control_addr));
        self.registry = Some(RemoteHandle::resolve(self.config.registry_addr));
        self.state = RunState::ServerReady;
        info!("✅ Server ready; control and registry handles resolved");
        Ok(())
    }

    /// Begin the per-test transaction on the pinned connection
    pub async fn begin_transaction(&mut self) -> Result<(), DriverError> {
        let control = self.control_handle()?;
        control.invoke("beginTransaction", json!({})).await?;
        self.state = RunState::TxBegun;
        Ok(())
    }

    /// Roll back the per-test transaction
    ///
    /// The state only advances to `TxRolledBack` when the server confirmed
    /// the rollback; a failed attempt leaves the state untouched.
    pub async fn rollback_transaction(&mut self) -> Result<(), DriverError> {
        let control = self.control_handle()?;

        match control.invoke("rollbackTransaction", json!({})).await {
            Ok(_) => {
                self.state = RunState::TxRolledBack;
                Ok(())
            }
            Err(e) if e.remote_code() == Some(UNBALANCED_TRANSACTION) => {
                Err(DriverError::UnbalancedTransaction)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run one test body inside a begin/rollback pair
    ///
    /// The body is spawned as its own task so a panic inside it is contained
    /// as a join error; the rollback is issued afterwards no matter how the
    /// body exited. A rollback failure after a failed body is logged but
    /// does not mask the body's failure.
    pub async fn run_test<F, Fut>(&mut self, body: F) -> Result<(), DriverError>
    where
        F: FnOnce(TestContext) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let registry = self
            .registry
            .clone()
            .ok_or(DriverError::InvalidState {
                expected: "ServerReady",
                actual: self.state,
            })?;

        self.begin_transaction().await?;

        let outcome = tokio::spawn(body(TestContext { registry })).await;

        // Rollback on every exit path, before the outcome is inspected.
        let rollback_result = self.rollback_transaction().await;

        let body_result = match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DriverError::TestFailed(format!("{:#}", e))),
            Err(join_error) => Err(DriverError::TestPanicked(join_error.to_string())),
        };

        match (body_result, rollback_result) {
            (Ok(()), Ok(())) => Ok(()),
            (Ok(()), Err(rollback_error)) => Err(rollback_error),
            (Err(body_error), rollback_result) => {
                if let Err(rollback_error) = rollback_result {
                    error!("Rollback after failed test also failed: {}", rollback_error);
                }
                Err(body_error)
            }
        }
    }

    /// Stop the server under test, forcing termination after the grace period
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<(), DriverError> {
        self.state = RunState::ServerStopping;
        info!("🛑 Stopping server under test");

        let exited = self
            .supervisor
            .stop(self.config.shutdown_grace)
            .await
            .map_err(|e| DriverError::Supervisor(format!("{:#}", e)))?;

        if !exited {
            warn!(
                "Server did not exit within {:?}; killing",
                self.config.shutdown_grace
            );
            self.supervisor
                .kill()
                .await
                .map_err(|e| DriverError::Supervisor(format!("{:#}", e)))?;
        }

        self.control = None;
        self.registry = None;
        self.state = RunState::Stopped;
        Ok(())
    }

    fn control_handle(&self) -> Result<&RemoteHandle, DriverError> {
        self.control.as_ref().ok_or(DriverError::InvalidState {
            expected: "ServerReady",
            actual: self.state,
        })
    }
}
