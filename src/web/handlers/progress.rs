use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::VerifiedUser;
use crate::store::types::parse_date;
use crate::store::{NewProgress, Progress, ProgressPatch};
use crate::web::{store_failure, ApiResponse};
use crate::AppContext;

pub fn progress_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", post(create_progress))
        .route("/with_tasks", get(progress_with_tasks))
        .route("/:progress_id", patch(update_progress))
        .with_state(ctx)
}

#[derive(Debug, Deserialize)]
struct CreateProgressRequest {
    task_id: i64,
    date: String,
    progress_percent: Option<i64>,
    student_note: Option<String>,
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct UpdateProgressRequest {
    date: Option<String>,
    progress_percent: Option<i64>,
    student_note: Option<String>,
    teacher_feedback: Option<String>,
    score: Option<f64>,
}

async fn create_progress(
    State(ctx): State<Arc<AppContext>>,
    Extension(user): Extension<VerifiedUser>,
    Json(req): Json<CreateProgressRequest>,
) -> (StatusCode, Json<ApiResponse<Progress>>) {
    let date = match parse_date(&req.date) {
        Ok(date) => date,
        Err(e) => return store_failure(e),
    };

    let progress = NewProgress {
        task_id: req.task_id,
        date,
        progress_percent: req.progress_percent,
        student_note: req.student_note.unwrap_or_default(),
        score: req.score,
    };

    match ctx.store.create_progress(user.user_id, progress).await {
        Ok(progress) => (StatusCode::CREATED, Json(ApiResponse::success(progress))),
        Err(e) => store_failure(e),
    }
}

async fn progress_with_tasks(
    State(ctx): State<Arc<AppContext>>,
    Extension(user): Extension<VerifiedUser>,
) -> impl IntoResponse {
    match ctx.store.list_tasks_with_progress(user.user_id).await {
        Ok(views) => (StatusCode::OK, Json(ApiResponse::success(views))),
        Err(e) => store_failure(e),
    }
}

async fn update_progress(
    State(ctx): State<Arc<AppContext>>,
    Extension(user): Extension<VerifiedUser>,
    Path(progress_id): Path<i64>,
    Json(req): Json<UpdateProgressRequest>,
) -> (StatusCode, Json<ApiResponse<Progress>>) {
    let date = match req.date.as_deref().map(parse_date).transpose() {
        Ok(date) => date,
        Err(e) => return store_failure(e),
    };

    let patch = ProgressPatch {
        date,
        progress_percent: req.progress_percent,
        student_note: req.student_note,
        teacher_feedback: req.teacher_feedback,
        score: req.score,
    };

    match ctx.store.update_progress(user.user_id, progress_id, patch).await {
        Ok(progress) => (StatusCode::OK, Json(ApiResponse::success(progress))),
        Err(e) => store_failure(e),
    }
}
