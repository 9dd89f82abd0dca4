//! Task Fixture
//!
//! The fixture definition registered under specification key `"task"`. Each
//! instance is an in-memory task the test manipulates through its remote
//! handle; `save` writes it through the pinned connection, i.e. into the
//! transaction the driver currently holds open.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use txharness_core::{ConnectionPin, FixtureCatalog, FixtureObject, RpcError};
use uuid::Uuid;

/// Specification key for the task fixture
pub const TASK_SPEC: &str = "task";

struct TaskState {
    id: String,
    title: String,
    completed: bool,
}

/// One materialized task fixture instance
pub struct TaskFixture {
    pin: Arc<ConnectionPin>,
    state: Mutex<TaskState>,
}

impl TaskFixture {
    pub fn new(pin: Arc<ConnectionPin>) -> Self {
        Self {
            pin,
            state: Mutex::new(TaskState {
                id: Uuid::new_v4().to_string(),
                title: "untitled task".to_string(),
                completed: false,
            }),
        }
    }
}

#[async_trait]
impl FixtureObject for TaskFixture {
    async fn call(&self, method: &str, args: Value) -> Result<Value, RpcError> {
        match method {
            "id" => {
                let state = self.state.lock().await;
                Ok(json!({ "id": state.id }))
            }
            "title" => {
                let state = self.state.lock().await;
                Ok(json!({ "title": state.title }))
            }
            "set_title" => {
                let title = args
                    .get("title")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RpcError::invalid_params("missing title".to_string()))?;
                self.state.lock().await.title = title.to_string();
                Ok(json!({ "success": true }))
            }
            "complete" => {
                self.state.lock().await.completed = true;
                Ok(json!({ "success": true }))
            }
            "is_completed" => {
                let state = self.state.lock().await;
                Ok(json!({ "completed": state.completed }))
            }
            "save" => {
                let state = self.state.lock().await;
                let conn = self
                    .pin
                    .checkout()
                    .await
                    .map_err(|e| RpcError::fixture_failed(e.to_string()))?;

                conn.execute(
                    "INSERT INTO tasks (id, title, completed, created_at) VALUES (?, ?, ?, ?)",
                    (
                        state.id.as_str(),
                        state.title.as_str(),
                        state.completed as i64,
                        Utc::now().to_rfc3339(),
                    ),
                )
                .await
                .map_err(|e| RpcError::fixture_failed(format!("Failed to save task: {}", e)))?;

                Ok(json!({ "id": state.id }))
            }
            _ => Err(RpcError::method_not_found(method)),
        }
    }
}

/// Register the task fixture constructor in a catalog
pub fn register_task_fixture(catalog: &mut FixtureCatalog, pin: Arc<ConnectionPin>) {
    catalog.register(
        TASK_SPEC,
        Arc::new(move || Arc::new(TaskFixture::new(pin.clone())) as Arc<dyn FixtureObject>),
    );
}
