//! Endpoint Publishing
//!
//! Serves one object at one TCP address. Each accepted connection runs a
//! line-oriented loop: read a JSON-RPC request, dispatch it against the
//! published target, write the response.

use crate::rpc::types::{RpcError, RpcRequest, RpcResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{tcp::OwnedWriteHalf, TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// A server-side object reachable over RPC
///
/// One implementation per endpoint kind: the transaction control surface,
/// the fixture registry, and each published fixture instance.
#[async_trait]
pub trait RpcTarget: Send + Sync {
    /// Dispatch a single remote call against this object
    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}

/// A published endpoint serving one target
///
/// The listener stays bound for the lifetime of this value, which is what
/// guarantees the address is never handed out again while the endpoint
/// lives. [`shutdown`](Self::shutdown) (or drop) closes it.
pub struct PublishedEndpoint {
    addr: SocketAddr,
    shutdown: watch::Sender<bool>,
}

impl PublishedEndpoint {
    /// The bound address of this endpoint
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and tear down in-flight ones
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for PublishedEndpoint {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Publish a target on an already-bound listener
///
/// Spawns the accept loop and returns immediately. Binding is left to the
/// caller so well-known endpoints can use fixed ports while fixture
/// endpoints bind port 0 for a fresh OS-assigned address.
///
/// # Errors
///
/// Fails when the listener's local address cannot be read back.
pub fn publish(
    listener: TcpListener,
    target: Arc<dyn RpcTarget>,
) -> std::io::Result<PublishedEndpoint> {
    let addr = listener.local_addr()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(accept_loop(listener, target, shutdown_rx));
    info!("🔌 RPC endpoint published at {}", addr);

    Ok(PublishedEndpoint {
        addr,
        shutdown: shutdown_tx,
    })
}

async fn accept_loop(
    listener: TcpListener,
    target: Arc<dyn RpcTarget>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let conn_shutdown = shutdown.clone();
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!("Accepted RPC connection from {}", peer);
                        let target = target.clone();
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, target, conn_shutdown).await {
                                warn!("RPC connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept RPC connection: {}", e);
                    }
                }
            }
            _ = shutdown.changed() => {
                debug!("RPC endpoint shutting down");
                return;
            }
        }
    }
}

/// Serve one client connection until EOF or shutdown
#[instrument(skip_all)]
async fn serve_connection(
    stream: TcpStream,
    target: Arc<dyn RpcTarget>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let (read_half, write_half) = stream.into_split();
    let reader = BufReader::new(read_half);
    let mut writer = BufWriter::new(write_half);
    let mut lines = reader.lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.changed() => return Ok(()),
        };
        let Some(line) = line else {
            return Ok(());
        };
        debug!("📥 RPC request: {}", line);

        // Parse failures answer on id 0 and keep the connection open.
        let request: RpcRequest = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                warn!("❌ Failed to parse RPC request: {}", e);
                let response =
                    RpcResponse::error(0, RpcError::parse_error(format!("Invalid JSON: {}", e)));
                write_response(&mut writer, &response).await?;
                continue;
            }
        };

        let response = handle_request(&target, request).await;
        write_response(&mut writer, &response).await?;
    }
}

/// Dispatch a request and shape the outcome as a response
async fn handle_request(target: &Arc<dyn RpcTarget>, request: RpcRequest) -> RpcResponse {
    match target.dispatch(&request.method, request.params).await {
        Ok(result) => {
            debug!("✅ RPC request {} ({}) succeeded", request.id, request.method);
            RpcResponse::success(request.id, result)
        }
        Err(error) => {
            warn!(
                "❌ RPC request {} ({}) failed: {} (code: {})",
                request.id, request.method, error.message, error.code
            );
            RpcResponse::error(request.id, error)
        }
    }
}

async fn write_response(
    writer: &mut BufWriter<OwnedWriteHalf>,
    response: &RpcResponse,
) -> anyhow::Result<()> {
    let json = serde_json::to_string(response)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
