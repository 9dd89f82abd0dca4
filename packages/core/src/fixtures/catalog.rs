//! Fixture Catalog
//!
//! Registered mapping from specification key to constructor function,
//! resolved at startup. Dispatch never involves reflection: an unknown key
//! is an error, a known key runs its registered closure.

use crate::rpc::types::RpcError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Server-side behavior of one published fixture instance
///
/// The registry publishes each object behind an RPC endpoint; every remote
/// `invoke(method, args)` lands here.
#[async_trait]
pub trait FixtureObject: Send + Sync {
    /// Invoke a method on this fixture instance
    async fn call(&self, method: &str, args: Value) -> Result<Value, RpcError>;
}

/// Constructor closure for one fixture specification
pub type FixtureCtor = Arc<dyn Fn() -> Arc<dyn FixtureObject> + Send + Sync>;

/// Specification-key to constructor mapping
///
/// # Examples
///
/// ```ignore
/// let mut catalog = FixtureCatalog::new();
/// catalog.register("task", Arc::new(|| Arc::new(TaskFixture::new()) as Arc<dyn FixtureObject>));
/// let task = catalog.build("task")?;
/// ```
#[derive(Default)]
pub struct FixtureCatalog {
    ctors: HashMap<String, FixtureCtor>,
}

impl FixtureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under a specification key
    ///
    /// Registering the same key twice replaces the earlier constructor.
    pub fn register(&mut self, spec: impl Into<String>, ctor: FixtureCtor) {
        self.ctors.insert(spec.into(), ctor);
    }

    /// Build a fresh instance for the given specification key
    ///
    /// Returns `None` for unknown keys; the registry shapes that into an
    /// UnknownFixture error.
    pub fn build(&self, spec: &str) -> Option<Arc<dyn FixtureObject>> {
        self.ctors.get(spec).map(|ctor| ctor())
    }

    /// Registered specification keys
    pub fn specs(&self) -> Vec<&str> {
        self.ctors.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoFixture;

    #[async_trait]
    impl FixtureObject for EchoFixture {
        async fn call(&self, method: &str, args: Value) -> Result<Value, RpcError> {
            Ok(json!({ "method": method, "args": args }))
        }
    }

    #[tokio::test]
    async fn test_registered_spec_builds_fresh_instances() {
        let mut catalog = FixtureCatalog::new();
        catalog.register(
            "echo",
            Arc::new(|| Arc::new(EchoFixture) as Arc<dyn FixtureObject>),
        );

        assert_eq!(catalog.specs(), vec!["echo"]);

        let a = catalog.build("echo").unwrap();
        let b = catalog.build("echo").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));

        let result = a.call("greet", json!({"name": "x"})).await.unwrap();
        assert_eq!(result["method"], "greet");
    }

    #[test]
    fn test_unknown_spec_builds_nothing() {
        let catalog = FixtureCatalog::new();
        assert!(catalog.build("ghost").is_none());
    }
}
