//! REST Task Endpoints
//!
//! The external interface the test body exercises. Every handler checks out
//! the pinned connection, so reads and writes participate in whatever
//! transaction the remote driver currently holds open.
//!
//! # Endpoints
//!
//! - `GET /api/health` - readiness probe
//! - `POST /api/tasks` - create a task
//! - `GET /api/tasks` - list all tasks
//! - `GET /api/tasks/:id` - get one task
//! - `DELETE /api/tasks/:id` - delete one task

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use txharness_core::{ConnectionPin, DatabaseError};
use uuid::Uuid;

/// Application state shared across all endpoints
///
/// Only the pin: the whole point of the harness is that handlers never own
/// connections of their own.
#[derive(Clone)]
pub struct AppState {
    pub pin: Arc<ConnectionPin>,
}

/// A stored task
#[derive(Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub created_at: String,
}

/// Request body for task creation
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

/// HTTP error response body
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
    pub code: String,
}

impl ApiError {
    fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
        }
    }

    fn task_not_found(id: &str) -> Self {
        Self::new(format!("Task not found: {}", id), "TASK_NOT_FOUND")
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        Self::new(err.to_string(), "DATABASE_ERROR")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "TASK_NOT_FOUND" => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Build the task API router
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/tasks", post(create_task).get(list_tasks))
        .route("/api/tasks/:id", get(get_task).delete(delete_task))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn create_task(
    State(state): State<AppState>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let conn = state.pin.checkout().await?;

    let task = Task {
        id: Uuid::new_v4().to_string(),
        title: request.title,
        completed: false,
        created_at: Utc::now().to_rfc3339(),
    };

    conn.execute(
        "INSERT INTO tasks (id, title, completed, created_at) VALUES (?, ?, ?, ?)",
        (
            task.id.as_str(),
            task.title.as_str(),
            task.completed as i64,
            task.created_at.as_str(),
        ),
    )
    .await
    .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert task: {}", e)))?;

    Ok((StatusCode::CREATED, Json(task)))
}

async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<Task>>, ApiError> {
    let conn = state.pin.checkout().await?;

    let mut stmt = conn
        .prepare("SELECT id, title, completed, created_at FROM tasks ORDER BY created_at")
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to prepare list query: {}", e)))?;
    let mut rows = stmt
        .query(())
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to list tasks: {}", e)))?;

    let mut tasks = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
    {
        tasks.push(row_to_task(&row)?);
    }

    Ok(Json(tasks))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let conn = state.pin.checkout().await?;

    let mut stmt = conn
        .prepare("SELECT id, title, completed, created_at FROM tasks WHERE id = ?")
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to prepare get query: {}", e)))?;
    let mut rows = stmt
        .query([id.as_str()])
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get task: {}", e)))?;

    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
    {
        Some(row) => Ok(Json(row_to_task(&row)?)),
        None => Err(ApiError::task_not_found(&id)),
    }
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let conn = state.pin.checkout().await?;

    let affected = conn
        .execute("DELETE FROM tasks WHERE id = ?", [id.as_str()])
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to delete task: {}", e)))?;

    if affected == 0 {
        return Err(ApiError::task_not_found(&id));
    }
    Ok(StatusCode::NO_CONTENT)
}

fn row_to_task(row: &libsql::Row) -> Result<Task, ApiError> {
    let completed: i64 = row
        .get(2)
        .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
    Ok(Task {
        id: row
            .get(0)
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?,
        title: row
            .get(1)
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?,
        completed: completed != 0,
        created_at: row
            .get(3)
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?,
    })
}
