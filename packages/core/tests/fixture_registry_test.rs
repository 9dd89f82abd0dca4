//! Integration tests for fixture provisioning
//!
//! Exercises the registry through its published RPC surface: address
//! uniqueness, per-instance state isolation, and unknown-spec failures.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use txharness_core::rpc::types::UNKNOWN_FIXTURE;
use txharness_core::rpc::{publish, PublishedEndpoint, RemoteHandle};
use txharness_core::{FixtureCatalog, FixtureObject, FixtureRegistry, RpcError};
use txharness_core::fixtures::RegistryTarget;

/// Fixture with per-instance mutable state
struct CounterFixture {
    count: Mutex<i64>,
}

#[async_trait]
impl FixtureObject for CounterFixture {
    async fn call(&self, method: &str, _args: Value) -> Result<Value, RpcError> {
        match method {
            "increment" => {
                let mut count = self.count.lock().await;
                *count += 1;
                Ok(json!({ "count": *count }))
            }
            "value" => Ok(json!({ "count": *self.count.lock().await })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }
}

fn create_test_catalog() -> FixtureCatalog {
    let mut catalog = FixtureCatalog::new();
    catalog.register(
        "counter",
        Arc::new(|| {
            Arc::new(CounterFixture {
                count: Mutex::new(0),
            }) as Arc<dyn FixtureObject>
        }),
    );
    catalog
}

async fn publish_registry() -> (Arc<FixtureRegistry>, PublishedEndpoint, RemoteHandle) {
    let registry = Arc::new(FixtureRegistry::new(create_test_catalog()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = publish(listener, Arc::new(RegistryTarget::new(registry.clone()))).unwrap();
    let handle = RemoteHandle::resolve(endpoint.addr());
    (registry, endpoint, handle)
}

async fn create_instance(registry: &RemoteHandle, spec: &str) -> RemoteHandle {
    let result = registry
        .invoke("createFixtureInstance", json!({ "spec": spec }))
        .await
        .unwrap();
    let addr = result["address"].as_str().unwrap().parse().unwrap();
    RemoteHandle::resolve(addr)
}

#[tokio::test]
async fn test_each_instance_gets_a_distinct_address() {
    let (registry, _endpoint, handle) = publish_registry().await;

    let mut addresses = HashSet::new();
    for _ in 0..10 {
        let result = handle
            .invoke("createFixtureInstance", json!({ "spec": "counter" }))
            .await
            .unwrap();
        addresses.insert(result["address"].as_str().unwrap().to_string());
    }

    assert_eq!(addresses.len(), 10);
    assert_eq!(registry.instance_count().await, 10);
}

#[tokio::test]
async fn test_instances_do_not_share_state() {
    let (_registry, _endpoint, handle) = publish_registry().await;

    let a = create_instance(&handle, "counter").await;
    let b = create_instance(&handle, "counter").await;
    assert_ne!(a.addr(), b.addr());

    a.invoke("increment", json!({})).await.unwrap();
    a.invoke("increment", json!({})).await.unwrap();

    let a_value = a.invoke("value", json!({})).await.unwrap();
    let b_value = b.invoke("value", json!({})).await.unwrap();
    assert_eq!(a_value["count"], 2);
    assert_eq!(b_value["count"], 0);
}

#[tokio::test]
async fn test_unknown_spec_is_fatal_setup_error() {
    let (_registry, _endpoint, handle) = publish_registry().await;

    let err = handle
        .invoke("createFixtureInstance", json!({ "spec": "ghost" }))
        .await
        .unwrap_err();
    assert_eq!(err.remote_code(), Some(UNKNOWN_FIXTURE));
}

#[tokio::test]
async fn test_unpublish_reclaims_endpoint() {
    let (registry, _endpoint, handle) = publish_registry().await;

    let fixture = create_instance(&handle, "counter").await;
    fixture.invoke("increment", json!({})).await.unwrap();
    assert_eq!(registry.instance_count().await, 1);

    assert!(registry.unpublish(fixture.addr()).await);
    assert_eq!(registry.instance_count().await, 0);

    // Second unpublish of the same address is a no-op.
    assert!(!registry.unpublish(fixture.addr()).await);

    // A fresh connection to the reclaimed endpoint is refused.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let fresh = RemoteHandle::resolve(fixture.addr());
    assert!(fresh.invoke("value", json!({})).await.is_err());
}

#[tokio::test]
async fn test_dropped_handle_leaves_object_alive() {
    let (registry, _endpoint, handle) = publish_registry().await;

    let fixture = create_instance(&handle, "counter").await;
    let addr = fixture.addr();
    fixture.invoke("increment", json!({})).await.unwrap();
    drop(fixture);

    // Handles are non-owning: the object still answers at the same address.
    let again = RemoteHandle::resolve(addr);
    let value = again.invoke("value", json!({})).await.unwrap();
    assert_eq!(value["count"], 1);
    assert_eq!(registry.instance_count().await, 1);
}
