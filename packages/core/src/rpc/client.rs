//! Client-Side Remote Handles
//!
//! A [`RemoteHandle`] is a non-owning reference to an object living in the
//! server process: an (address, connection) pair whose every operation is an
//! explicit RPC call. Dropping a handle never destroys the remote object.

use crate::rpc::types::{RpcRequest, RpcResponse};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

/// Remote call errors, split by origin
///
/// Transport failures mean the endpoint could not be reached or the
/// connection died mid-call; execution failures mean the remote object
/// itself answered with an error (carried as a serialized description,
/// never the original error type).
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Endpoint unreachable, connection refused, or connection lost
    #[error("Transport error calling {addr}: {message}")]
    Transport { addr: SocketAddr, message: String },

    /// The remote object raised during the call
    #[error("Remote execution error (code {code}): {message}")]
    Execution { code: i32, message: String },

    /// The server answered with a malformed response
    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    fn transport(addr: SocketAddr, e: impl std::fmt::Display) -> Self {
        Self::Transport {
            addr,
            message: e.to_string(),
        }
    }

    /// Whether the failure originated in the remote object (as opposed to
    /// the transport between the processes)
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }

    /// The wire error code, when the failure was remote
    pub fn remote_code(&self) -> Option<i32> {
        match self {
            Self::Execution { code, .. } => Some(*code),
            _ => None,
        }
    }
}

struct HandleInner {
    addr: SocketAddr,
    next_id: AtomicU64,
    conn: Mutex<Option<BufStream<TcpStream>>>,
}

/// Client-side stub for one published server-side object
///
/// Cheap to clone; clones share the cached connection. Resolution does not
/// touch the network; the address is validated lazily on the first
/// [`invoke`](Self::invoke).
#[derive(Clone)]
pub struct RemoteHandle {
    inner: Arc<HandleInner>,
}

impl RemoteHandle {
    /// Bind to a known address without contacting the server
    pub fn resolve(addr: SocketAddr) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                addr,
                next_id: AtomicU64::new(1),
                conn: Mutex::new(None),
            }),
        }
    }

    /// The address this handle points at
    pub fn addr(&self) -> SocketAddr {
        self.inner.addr
    }

    /// Invoke a method on the remote object
    ///
    /// Awaits until the server responds or the transport fails; no implicit
    /// timeout is applied; callers wrap the future themselves if they need
    /// one.
    ///
    /// # Errors
    ///
    /// [`RemoteError::Transport`] when the endpoint is unreachable or the
    /// connection drops (the cached connection is discarded so the next
    /// invoke reconnects); [`RemoteError::Execution`] when the remote object
    /// answered with an error.
    pub async fn invoke(&self, method: &str, args: Value) -> Result<Value, RemoteError> {
        let addr = self.inner.addr;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, args);
        let json = serde_json::to_string(&request)
            .map_err(|e| RemoteError::InvalidResponse(format!("request did not serialize: {}", e)))?;

        let mut conn_slot = self.inner.conn.lock().await;
        let conn = match conn_slot.as_mut() {
            Some(conn) => conn,
            None => {
                let stream = TcpStream::connect(addr)
                    .await
                    .map_err(|e| RemoteError::transport(addr, e))?;
                debug!("Connected remote handle to {}", addr);
                conn_slot.insert(BufStream::new(stream))
            }
        };

        let result = Self::round_trip(conn, &json)
            .await
            .map_err(|e| RemoteError::transport(addr, e));

        let line = match result {
            Ok(line) => line,
            Err(e) => {
                // Next invoke starts from a fresh connection.
                *conn_slot = None;
                return Err(e);
            }
        };

        let response: RpcResponse = serde_json::from_str(&line)
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;

        if response.id != id {
            return Err(RemoteError::InvalidResponse(format!(
                "response id {} does not match request id {}",
                response.id, id
            )));
        }

        if let Some(error) = response.error {
            return Err(RemoteError::Execution {
                code: error.code,
                message: error.message,
            });
        }

        response
            .result
            .ok_or_else(|| RemoteError::InvalidResponse("neither result nor error".to_string()))
    }

    async fn round_trip(conn: &mut BufStream<TcpStream>, json: &str) -> std::io::Result<String> {
        conn.write_all(json.as_bytes()).await?;
        conn.write_all(b"\n").await?;
        conn.flush().await?;

        let mut line = String::new();
        let read = conn.read_line(&mut line).await?;
        if read == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before response",
            ));
        }
        Ok(line)
    }
}

impl std::fmt::Debug for RemoteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteHandle")
            .field("addr", &self.inner.addr)
            .finish()
    }
}
