//! Fixture Registry
//!
//! Builds fixture objects from the catalog and publishes each one at a fresh
//! TCP endpoint. Addresses are never reused while the registry is alive: the
//! listener behind an endpoint stays bound until the endpoint is explicitly
//! unpublished or the process exits, so the OS cannot hand the port out
//! again. Endpoints are not garbage collected: acceptable for short-lived
//! test runs, a known leak hazard on long-running shared servers.

use crate::fixtures::catalog::{FixtureCatalog, FixtureObject};
use crate::rpc::server::{publish, PublishedEndpoint, RpcTarget};
use crate::rpc::types::RpcError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;

/// Fixture provisioning errors
#[derive(Error, Debug)]
pub enum FixtureError {
    /// The specification key resolves to no registered fixture definition
    #[error("Unknown fixture specification: {spec}")]
    UnknownFixture { spec: String },

    /// Binding or publishing the fixture endpoint failed
    #[error("Failed to publish fixture endpoint: {0}")]
    Publish(#[from] std::io::Error),
}

/// Server-side fixture factory and endpoint bookkeeper
pub struct FixtureRegistry {
    catalog: FixtureCatalog,
    endpoints: Mutex<HashMap<SocketAddr, PublishedEndpoint>>,
}

impl FixtureRegistry {
    pub fn new(catalog: FixtureCatalog) -> Self {
        Self {
            catalog,
            endpoints: Mutex::new(HashMap::new()),
        }
    }

    /// Materialize a fixture instance and publish it at a fresh address
    ///
    /// Binds an OS-assigned loopback port, so two calls never return the
    /// same address while the registry is alive. The published object stays
    /// addressable (and mutable from the client) until
    /// [`unpublish`](Self::unpublish) or process shutdown.
    ///
    /// # Errors
    ///
    /// [`FixtureError::UnknownFixture`] for an unregistered specification;
    /// the caller should treat this as a fatal setup error, not retried.
    pub async fn create_instance(&self, spec: &str) -> Result<SocketAddr, FixtureError> {
        let object = self
            .catalog
            .build(spec)
            .ok_or_else(|| FixtureError::UnknownFixture {
                spec: spec.to_string(),
            })?;

        let listener =
            TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)).await?;
        let endpoint = publish(listener, Arc::new(FixtureTarget { object }))?;
        let addr = endpoint.addr();

        self.endpoints.lock().await.insert(addr, endpoint);
        info!("🧩 Fixture '{}' published at {}", spec, addr);
        Ok(addr)
    }

    /// Tear down a published fixture endpoint
    ///
    /// Returns false when the address was never issued (or already
    /// unpublished).
    pub async fn unpublish(&self, addr: SocketAddr) -> bool {
        match self.endpoints.lock().await.remove(&addr) {
            Some(endpoint) => {
                endpoint.shutdown();
                info!("🧹 Fixture endpoint {} unpublished", addr);
                true
            }
            None => false,
        }
    }

    /// Number of currently published fixture endpoints
    pub async fn instance_count(&self) -> usize {
        self.endpoints.lock().await.len()
    }
}

/// RPC target forwarding every call to one fixture object
struct FixtureTarget {
    object: Arc<dyn FixtureObject>,
}

#[async_trait]
impl RpcTarget for FixtureTarget {
    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.object.call(method, params).await
    }
}

#[derive(Debug, Deserialize)]
struct CreateInstanceParams {
    spec: String,
}

/// RPC surface of the registry itself
///
/// Published at the well-known registry address; `discover()` on the client
/// side is simply resolving that configured address.
pub struct RegistryTarget {
    registry: Arc<FixtureRegistry>,
}

impl RegistryTarget {
    pub fn new(registry: Arc<FixtureRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl RpcTarget for RegistryTarget {
    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "createFixtureInstance" => {
                let params: CreateInstanceParams = serde_json::from_value(params)
                    .map_err(|e| RpcError::invalid_params(format!("Invalid parameters: {}", e)))?;

                let addr = match self.registry.create_instance(&params.spec).await {
                    Ok(addr) => addr,
                    Err(FixtureError::UnknownFixture { spec }) => {
                        return Err(RpcError::unknown_fixture(&spec));
                    }
                    Err(e) => return Err(RpcError::fixture_failed(e.to_string())),
                };

                Ok(json!({ "address": addr.to_string() }))
            }
            "ping" => Ok(json!({ "status": "ok" })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }
}
