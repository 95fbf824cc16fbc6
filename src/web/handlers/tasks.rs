use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::VerifiedUser;
use crate::store::types::parse_date;
use crate::store::{NewTask, Task, TaskPatch, TaskStatus};
use crate::web::{store_failure, ApiResponse};
use crate::AppContext;

pub fn task_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/:task_id", patch(update_task).delete(delete_task))
        .with_state(ctx)
}

#[derive(Debug, Deserialize)]
struct CreateTaskRequest {
    subject: String,
    title: String,
    #[serde(rename = "type")]
    task_type: String,
    date: String,
    status: Option<String>,
    unit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateTaskRequest {
    subject: Option<String>,
    title: Option<String>,
    #[serde(rename = "type")]
    task_type: Option<String>,
    date: Option<String>,
    status: Option<String>,
    unit: Option<String>,
}

async fn list_tasks(
    State(ctx): State<Arc<AppContext>>,
    Extension(user): Extension<VerifiedUser>,
) -> impl IntoResponse {
    match ctx.store.list_tasks(user.user_id).await {
        Ok(tasks) => (StatusCode::OK, Json(ApiResponse::success(tasks))),
        Err(e) => store_failure(e),
    }
}

async fn create_task(
    State(ctx): State<Arc<AppContext>>,
    Extension(user): Extension<VerifiedUser>,
    Json(req): Json<CreateTaskRequest>,
) -> (StatusCode, Json<ApiResponse<Task>>) {
    let date = match parse_date(&req.date) {
        Ok(date) => date,
        Err(e) => return store_failure(e),
    };
    let status = match req.status.as_deref().map(TaskStatus::parse).transpose() {
        Ok(status) => status,
        Err(e) => return store_failure(e),
    };

    let task = NewTask {
        subject: req.subject,
        title: req.title,
        task_type: req.task_type,
        date,
        status,
        unit: req.unit.unwrap_or_default(),
    };

    match ctx.store.create_task(user.user_id, task).await {
        Ok(task) => (StatusCode::CREATED, Json(ApiResponse::success(task))),
        Err(e) => store_failure(e),
    }
}

async fn update_task(
    State(ctx): State<Arc<AppContext>>,
    Extension(user): Extension<VerifiedUser>,
    Path(task_id): Path<i64>,
    Json(req): Json<UpdateTaskRequest>,
) -> (StatusCode, Json<ApiResponse<Task>>) {
    let date = match req.date.as_deref().map(parse_date).transpose() {
        Ok(date) => date,
        Err(e) => return store_failure(e),
    };
    let status = match req.status.as_deref().map(TaskStatus::parse).transpose() {
        Ok(status) => status,
        Err(e) => return store_failure(e),
    };

    let patch = TaskPatch {
        subject: req.subject,
        title: req.title,
        task_type: req.task_type,
        date,
        status,
        unit: req.unit,
    };

    match ctx.store.update_task(user.user_id, task_id, patch).await {
        Ok(task) => (StatusCode::OK, Json(ApiResponse::success(task))),
        Err(e) => store_failure(e),
    }
}

async fn delete_task(
    State(ctx): State<Arc<AppContext>>,
    Extension(user): Extension<VerifiedUser>,
    Path(task_id): Path<i64>,
) -> impl IntoResponse {
    match ctx.store.delete_task(user.user_id, task_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success("Task deleted successfully".to_string())),
        ),
        Err(e) => store_failure(e),
    }
}
