//! End-to-end harness tests against a live taskserver
//!
//! Each test spins up the full stack on fresh ports: REST listener, control
//! endpoint, fixture registry, all over one pinned connection into a
//! scratch database. The driver wraps test bodies in begin/rollback exactly
//! as a real suite would, and the REST assertions go over actual HTTP.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use txharness_core::{HarnessConfig, ServerSupervisor, TestLifecycleDriver};
use txharness_taskserver::{spawn, RunningTaskserver, TaskserverConfig};

/// Supervisor that runs the taskserver as in-process tokio tasks
struct InProcessSupervisor {
    config: TaskserverConfig,
    running: Option<RunningTaskserver>,
}

#[async_trait]
impl ServerSupervisor for InProcessSupervisor {
    async fn start(&mut self) -> anyhow::Result<()> {
        self.running = Some(spawn(self.config.clone()).await?);
        Ok(())
    }

    async fn stop(&mut self, _grace: Duration) -> anyhow::Result<bool> {
        if let Some(server) = self.running.take() {
            server.shutdown();
        }
        Ok(true)
    }

    async fn kill(&mut self) -> anyhow::Result<()> {
        if let Some(server) = self.running.take() {
            server.shutdown();
        }
        Ok(())
    }
}

/// Pick a free loopback port by binding port 0 and releasing it
async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Full test environment: driver over a taskserver on fresh ports
async fn create_test_env() -> (TestLifecycleDriver<InProcessSupervisor>, String, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let rest_port = free_port().await;
    let harness = HarnessConfig::on_ports(free_port().await, free_port().await);

    let config = TaskserverConfig {
        harness: harness.clone(),
        rest_addr: SocketAddr::from(([127, 0, 0, 1], rest_port)),
        db_path: temp_dir.path().join("tasks.db"),
    };
    let base_url = format!("http://{}", config.rest_addr);

    let supervisor = InProcessSupervisor {
        config,
        running: None,
    };
    let mut driver = TestLifecycleDriver::new(supervisor, harness);
    driver.start().await.unwrap();

    (driver, base_url, temp_dir)
}

async fn list_tasks(base_url: &str) -> Vec<Value> {
    reqwest::get(format!("{}/api/tasks", base_url))
        .await
        .unwrap()
        .json::<Vec<Value>>()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint_answers() {
    let (mut driver, base_url, _temp_dir) = create_test_env().await;

    let health: Value = reqwest::get(format!("{}/api/health", base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    driver.stop().await.unwrap();
}

#[tokio::test]
async fn test_rest_write_is_rolled_back_between_tests() {
    let (mut driver, base_url, _temp_dir) = create_test_env().await;

    // Test 1: create a task over REST and read it back inside the same
    // transaction.
    let url = base_url.clone();
    driver
        .run_test(move |_ctx| async move {
            let client = reqwest::Client::new();
            let response = client
                .post(format!("{}/api/tasks", url))
                .json(&json!({ "title": "created in test" }))
                .send()
                .await?;
            anyhow::ensure!(response.status() == 201);
            let task: Value = response.json().await?;

            // The uncommitted write is visible to a second REST call: both
            // requests share the pinned connection.
            let fetched: Value = reqwest::get(format!("{}/api/tasks/{}", url, task["id"].as_str().unwrap()))
                .await?
                .json()
                .await?;
            anyhow::ensure!(fetched["title"] == "created in test");
            Ok(())
        })
        .await
        .unwrap();

    // Test 2: a fresh transaction observes none of test 1's writes.
    let url = base_url.clone();
    driver
        .run_test(move |_ctx| async move {
            let tasks: Vec<Value> = reqwest::get(format!("{}/api/tasks", url))
                .await?
                .json()
                .await?;
            anyhow::ensure!(tasks.is_empty(), "rolled-back task still visible");
            Ok(())
        })
        .await
        .unwrap();

    driver.stop().await.unwrap();
}

#[tokio::test]
async fn test_fixture_save_participates_in_the_transaction() {
    let (mut driver, base_url, _temp_dir) = create_test_env().await;

    let url = base_url.clone();
    driver
        .run_test(move |ctx| async move {
            let task = ctx.create_fixture("task").await?;
            task.invoke("set_title", json!({ "title": "from fixture" }))
                .await?;
            let saved = task.invoke("save", json!({})).await?;
            let id = saved["id"].as_str().unwrap().to_string();

            // The saved fixture is visible over REST within the test.
            let fetched: Value = reqwest::get(format!("{}/api/tasks/{}", url, id))
                .await?
                .json()
                .await?;
            anyhow::ensure!(fetched["title"] == "from fixture");
            Ok(())
        })
        .await
        .unwrap();

    // And gone after the rollback.
    assert!(list_tasks(&base_url).await.is_empty());

    driver.stop().await.unwrap();
}

#[tokio::test]
async fn test_task_fixtures_do_not_alias() {
    let (mut driver, _base_url, _temp_dir) = create_test_env().await;

    driver
        .run_test(|ctx| async move {
            let a = ctx.create_fixture("task").await?;
            let b = ctx.create_fixture("task").await?;
            anyhow::ensure!(a.addr() != b.addr());

            a.invoke("set_title", json!({ "title": "only A" })).await?;
            a.invoke("complete", json!({})).await?;

            let b_title = b.invoke("title", json!({})).await?;
            anyhow::ensure!(b_title["title"] == "untitled task");
            let b_completed = b.invoke("is_completed", json!({})).await?;
            anyhow::ensure!(b_completed["completed"] == false);
            Ok(())
        })
        .await
        .unwrap();

    driver.stop().await.unwrap();
}

#[tokio::test]
async fn test_failing_body_still_leaves_a_clean_database() {
    let (mut driver, base_url, _temp_dir) = create_test_env().await;

    let url = base_url.clone();
    let result = driver
        .run_test(move |_ctx| async move {
            let client = reqwest::Client::new();
            client
                .post(format!("{}/api/tasks", url))
                .json(&json!({ "title": "doomed" }))
                .send()
                .await?;
            anyhow::bail!("assertion failed after the write");
        })
        .await;
    assert!(result.is_err());

    // The rollback ran despite the failure.
    assert!(list_tasks(&base_url).await.is_empty());

    driver.stop().await.unwrap();
}
