use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::VerifiedUser;
use crate::store::types::parse_date;
use crate::store::{AiSettings, SubjectConfig};
use crate::web::{store_failure, ApiResponse};
use crate::AppContext;

pub fn config_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/publishers", get(get_publishers).post(save_publishers))
        .route("/global", get(get_global_config).post(save_global_config))
        .route("/ai", get(get_ai_settings).post(save_ai_settings))
        .with_state(ctx)
}

async fn get_publishers(
    State(ctx): State<Arc<AppContext>>,
    Extension(user): Extension<VerifiedUser>,
) -> impl IntoResponse {
    match ctx.store.list_subject_configs(user.user_id).await {
        Ok(configs) => (StatusCode::OK, Json(ApiResponse::success(configs))),
        Err(e) => store_failure(e),
    }
}

#[derive(Debug, Deserialize)]
struct SavePublishersRequest {
    configs: Vec<SubjectConfig>,
}

async fn save_publishers(
    State(ctx): State<Arc<AppContext>>,
    Extension(user): Extension<VerifiedUser>,
    Json(req): Json<SavePublishersRequest>,
) -> impl IntoResponse {
    match ctx.store.upsert_subject_configs(user.user_id, &req.configs).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success("設定已成功儲存".to_string())),
        ),
        Err(e) => store_failure(e),
    }
}

async fn get_global_config(
    State(ctx): State<Arc<AppContext>>,
    Extension(user): Extension<VerifiedUser>,
) -> impl IntoResponse {
    match ctx.store.exam_dates(user.user_id).await {
        Ok(dates) => (StatusCode::OK, Json(ApiResponse::success(dates))),
        Err(e) => store_failure(e),
    }
}

#[derive(Debug, Deserialize)]
struct GlobalConfigRequest {
    grade: i64,
    midterm_date: Option<String>,
    final_date: Option<String>,
}

async fn save_global_config(
    State(ctx): State<Arc<AppContext>>,
    Extension(user): Extension<VerifiedUser>,
    Json(req): Json<GlobalConfigRequest>,
) -> (StatusCode, Json<ApiResponse<String>>) {
    let midterm = match req.midterm_date.as_deref().map(parse_date).transpose() {
        Ok(date) => date,
        Err(e) => return store_failure(e),
    };
    let final_date = match req.final_date.as_deref().map(parse_date).transpose() {
        Ok(date) => date,
        Err(e) => return store_failure(e),
    };

    match ctx
        .store
        .update_global_config(user.user_id, req.grade, midterm, final_date)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success("全域設定儲存成功".to_string())),
        ),
        Err(e) => store_failure(e),
    }
}

async fn get_ai_settings(
    State(ctx): State<Arc<AppContext>>,
    Extension(user): Extension<VerifiedUser>,
) -> impl IntoResponse {
    match ctx.store.ai_settings(user.user_id).await {
        Ok(settings) => (
            StatusCode::OK,
            Json(ApiResponse::success(settings.unwrap_or_default())),
        ),
        Err(e) => store_failure(e),
    }
}

async fn save_ai_settings(
    State(ctx): State<Arc<AppContext>>,
    Extension(user): Extension<VerifiedUser>,
    Json(settings): Json<AiSettings>,
) -> impl IntoResponse {
    match ctx.store.upsert_ai_settings(user.user_id, &settings).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success("AI 設定已儲存".to_string())),
        ),
        Err(e) => store_failure(e),
    }
}
