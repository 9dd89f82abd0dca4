//! RPC Substrate
//!
//! Newline-delimited JSON-RPC 2.0 over TCP. Each published server-side
//! object gets its own endpoint; the client addresses it through a
//! [`RemoteHandle`] and every operation is an explicit remote call; there is
//! no transparent proxying.
//!
//! # Wire format
//!
//! One JSON object per line in each direction:
//!
//! ```json
//! {"jsonrpc": "2.0", "id": 1, "method": "beginTransaction", "params": {}}
//! {"jsonrpc": "2.0", "id": 1, "result": {"depth": 1}}
//! ```

pub mod client;
pub mod control;
pub mod server;
pub mod types;

pub use client::{RemoteError, RemoteHandle};
pub use control::ControlTarget;
pub use server::{publish, PublishedEndpoint, RpcTarget};
pub use types::{RpcError, RpcRequest, RpcResponse};
