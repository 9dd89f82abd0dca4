//! Taskserver binary
//!
//! Runs the demonstration server under test until interrupted: REST task API
//! plus the harness control and registry endpoints.
//!
//! ```bash
//! TASKSERVER_DB=./tasks.db cargo run -p txharness-taskserver
//! ```

use tracing::info;
use tracing_subscriber::EnvFilter;
use txharness_taskserver::{spawn, TaskserverConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = TaskserverConfig::from_env();
    info!(
        "Starting taskserver (rest={}, control={}, registry={}, db={})",
        config.rest_addr,
        config.harness.control_addr,
        config.harness.registry_addr,
        config.db_path.display()
    );

    let server = spawn(config).await?;

    tokio::signal::ctrl_c().await?;
    server.shutdown();
    Ok(())
}
