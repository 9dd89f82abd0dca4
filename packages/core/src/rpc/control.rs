//! Transaction Control Endpoint
//!
//! The RPC surface of the pinned connection: `beginTransaction`,
//! `rollbackTransaction`, and `ping` for readiness probes. This is the
//! well-known endpoint the lifecycle driver resolves once per run.

use crate::db::{TransactionController, TransactionError};
use crate::rpc::server::RpcTarget;
use crate::rpc::types::RpcError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// RPC target wrapping the transaction controller
pub struct ControlTarget {
    controller: Arc<TransactionController>,
}

impl ControlTarget {
    pub fn new(controller: Arc<TransactionController>) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl RpcTarget for ControlTarget {
    async fn dispatch(&self, method: &str, _params: Value) -> Result<Value, RpcError> {
        match method {
            "beginTransaction" => {
                let depth = self.controller.begin().await.map_err(to_rpc_error)?;
                Ok(json!({ "depth": depth }))
            }
            "rollbackTransaction" => {
                let depth = self.controller.rollback().await.map_err(to_rpc_error)?;
                Ok(json!({ "depth": depth }))
            }
            "ping" => Ok(json!({ "status": "ok" })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }
}

fn to_rpc_error(error: TransactionError) -> RpcError {
    match error {
        TransactionError::Unbalanced => RpcError::unbalanced_transaction(),
        TransactionError::Resource(e) => RpcError::transaction_failed(e.to_string()),
    }
}
