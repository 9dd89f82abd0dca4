//! Server Process Supervision
//!
//! The server under test is started and stopped by an external collaborator;
//! the harness only needs the three operations below plus a way to observe
//! readiness. Readiness is probed by attempting TCP connects against the
//! control endpoint until the server accepts.

use crate::driver::DriverError;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Out-of-process lifecycle of the server under test
///
/// Implementations wrap whatever actually runs the server: a spawned child
/// process in CI, an in-process tokio task in this repo's integration tests.
#[async_trait]
pub trait ServerSupervisor: Send {
    /// Launch the server; returns once the launch was issued, not once the
    /// server is ready (readiness is polled separately)
    async fn start(&mut self) -> anyhow::Result<()>;

    /// Request a graceful stop; returns true if the server exited within the
    /// grace period
    async fn stop(&mut self, grace: Duration) -> anyhow::Result<bool>;

    /// Forcibly terminate the server
    async fn kill(&mut self) -> anyhow::Result<()>;
}

/// Poll until the address accepts TCP connections
///
/// # Errors
///
/// [`DriverError::ServerNotReady`] when the timeout elapses without a
/// successful connect.
pub async fn wait_until_ready(
    addr: SocketAddr,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), DriverError> {
    let deadline = Instant::now() + timeout;

    loop {
        match TcpStream::connect(addr).await {
            Ok(_) => {
                debug!("Server ready at {}", addr);
                return Ok(());
            }
            Err(e) => {
                if Instant::now() >= deadline {
                    return Err(DriverError::ServerNotReady {
                        addr,
                        waited: timeout,
                        last_error: e.to_string(),
                    });
                }
                sleep(poll_interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[tokio::test]
    async fn test_ready_once_listener_is_bound() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        wait_until_ready(addr, Duration::from_secs(1), Duration::from_millis(10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_times_out_against_dead_address() {
        // Port 1 on loopback is essentially never listening.
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 1);

        let err = wait_until_ready(addr, Duration::from_millis(200), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::ServerNotReady { .. }));
    }
}
