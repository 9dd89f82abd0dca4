//! Demonstration Server Under Test
//!
//! A small REST task API wired with the harness: every request handler
//! checks the pinned connection out of the [`ConnectionPin`], so REST writes
//! land inside the transaction the remote driver controls. Alongside the
//! REST listener the server publishes the two well-known harness endpoints
//! (transaction control and fixture registry).
//!
//! Used as a runnable binary (`main.rs`) and spawned in-process by the
//! integration tests.

pub mod endpoints;
pub mod fixture;

use crate::endpoints::AppState;
use crate::fixture::register_task_fixture;
use anyhow::Context;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;
use txharness_core::db::PinnedResource;
use txharness_core::fixtures::RegistryTarget;
use txharness_core::rpc::{publish, ControlTarget, PublishedEndpoint};
use txharness_core::{
    ConnectionPin, FixtureCatalog, FixtureRegistry, HarnessConfig, TransactionController,
};

/// Default port for the REST task API
pub const DEFAULT_REST_PORT: u16 = 4712;

/// Taskserver configuration
#[derive(Debug, Clone)]
pub struct TaskserverConfig {
    /// Harness endpoint addresses and timing knobs
    pub harness: HarnessConfig,

    /// Address of the REST task API (port 0 binds an OS-assigned port)
    pub rest_addr: SocketAddr,

    /// Path to the task database (`:memory:` works for throwaway runs)
    pub db_path: PathBuf,
}

impl TaskserverConfig {
    /// Config from environment variables with the usual fallbacks
    ///
    /// `TASKSERVER_PORT` (default 4712) and `TASKSERVER_DB` (default
    /// `:memory:`); harness ports come from [`HarnessConfig::default`].
    pub fn from_env() -> Self {
        let rest_port = std::env::var("TASKSERVER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_REST_PORT);
        let db_path = std::env::var("TASKSERVER_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(":memory:"));

        Self {
            harness: HarnessConfig::default(),
            rest_addr: SocketAddr::from(([127, 0, 0, 1], rest_port)),
            db_path,
        }
    }
}

/// A running taskserver with its three listeners
///
/// Dropping this (or calling [`shutdown`](Self::shutdown)) tears all of them
/// down.
pub struct RunningTaskserver {
    /// Actual bound address of the REST listener
    pub rest_addr: SocketAddr,

    /// Shared pin, exposed so in-process callers can inspect the database
    pub pin: Arc<ConnectionPin>,

    control: PublishedEndpoint,
    registry: PublishedEndpoint,
    rest_task: JoinHandle<()>,
}

impl RunningTaskserver {
    /// Base URL of the REST API
    pub fn rest_url(&self) -> String {
        format!("http://{}", self.rest_addr)
    }

    /// Tear down all three listeners
    pub fn shutdown(self) {
        self.control.shutdown();
        self.registry.shutdown();
        self.rest_task.abort();
        info!("🛑 Taskserver shut down");
    }
}

/// Start the taskserver: database, pin, harness endpoints, REST listener
pub async fn spawn(config: TaskserverConfig) -> anyhow::Result<RunningTaskserver> {
    // Database and pin. The pin is the single connection every REST handler
    // and fixture shares for the lifetime of the process.
    let db = libsql::Builder::new_local(&config.db_path)
        .build()
        .await
        .with_context(|| format!("opening task database at {}", config.db_path.display()))?;
    let pin = Arc::new(ConnectionPin::new(Arc::new(db)));
    initialize_schema(&pin).await?;

    // Transaction control endpoint at the well-known control address.
    let controller = Arc::new(TransactionController::new(Arc::new(PinnedResource::new(
        pin.clone(),
    ))));
    let control_listener = TcpListener::bind(config.harness.control_addr)
        .await
        .with_context(|| format!("binding control endpoint {}", config.harness.control_addr))?;
    let control = publish(control_listener, Arc::new(ControlTarget::new(controller)))?;

    // Fixture registry at the well-known registry address. The catalog is
    // resolved here, at startup.
    let mut catalog = FixtureCatalog::new();
    register_task_fixture(&mut catalog, pin.clone());
    let fixture_registry = Arc::new(FixtureRegistry::new(catalog));
    let registry_listener = TcpListener::bind(config.harness.registry_addr)
        .await
        .with_context(|| format!("binding registry endpoint {}", config.harness.registry_addr))?;
    let registry = publish(
        registry_listener,
        Arc::new(RegistryTarget::new(fixture_registry)),
    )?;

    // REST task API.
    let state = AppState { pin: pin.clone() };
    let router = endpoints::routes(state);
    let rest_listener = TcpListener::bind(config.rest_addr)
        .await
        .with_context(|| format!("binding REST listener {}", config.rest_addr))?;
    let rest_addr = rest_listener.local_addr()?;

    let rest_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(rest_listener, router).await {
            tracing::error!("REST server exited with error: {}", e);
        }
    });

    info!(
        "🚀 Taskserver up: rest={} control={} registry={}",
        rest_addr, control.addr(), registry.addr()
    );

    Ok(RunningTaskserver {
        rest_addr,
        pin,
        control,
        registry,
        rest_task,
    })
}

/// Create the tasks table, idempotently
async fn initialize_schema(pin: &Arc<ConnectionPin>) -> anyhow::Result<()> {
    let conn = pin.checkout().await?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        (),
    )
    .await
    .context("creating tasks table")?;
    Ok(())
}
