use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::VerifiedUser;
use crate::review;
use crate::store::types::parse_date;
use crate::store::ReviewFilter;
use crate::web::{store_failure, ApiResponse};
use crate::AppContext;

/// Number of recent wrong answers fed into a remedial quiz.
const QUIZ_ERROR_LIMIT: i64 = 8;

pub fn teacher_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/analysis", get(analysis))
        .route("/generate_quiz", post(generate_quiz))
        .with_state(ctx)
}

#[derive(Debug, Deserialize)]
struct AnalysisQuery {
    #[serde(default)]
    subject: String,
    start: Option<String>,
    end: Option<String>,
}

async fn analysis(
    State(ctx): State<Arc<AppContext>>,
    Extension(user): Extension<VerifiedUser>,
    Query(query): Query<AnalysisQuery>,
) -> (StatusCode, Json<ApiResponse<review::TeacherAnalysis>>) {
    let filter = ReviewFilter {
        subject: query.subject,
        start: match query.start.as_deref().map(parse_date).transpose() {
            Ok(date) => date,
            Err(e) => return store_failure(e),
        },
        end: match query.end.as_deref().map(parse_date).transpose() {
            Ok(date) => date,
            Err(e) => return store_failure(e),
        },
    };

    match ctx.store.analysis_rows(user.user_id, &filter).await {
        Ok(rows) => (
            StatusCode::OK,
            Json(ApiResponse::success(review::analyze(&rows))),
        ),
        Err(e) => store_failure(e),
    }
}

#[derive(Debug, Deserialize)]
struct GenerateQuizRequest {
    subject: Option<String>,
}

#[derive(Debug, Serialize)]
struct QuizResponse {
    quiz_content: String,
    publisher: String,
}

async fn generate_quiz(
    State(ctx): State<Arc<AppContext>>,
    Extension(user): Extension<VerifiedUser>,
    Json(req): Json<GenerateQuizRequest>,
) -> (StatusCode, Json<ApiResponse<QuizResponse>>) {
    let subject = req.subject.unwrap_or_else(|| "社會".to_string());

    let profile = match ctx.store.subject_profile(user.user_id, &subject).await {
        Ok(profile) => profile,
        Err(e) => return store_failure(e),
    };
    let errors = match ctx
        .store
        .recent_errors(user.user_id, &subject, QUIZ_ERROR_LIMIT)
        .await
    {
        Ok(errors) => errors,
        Err(e) => return store_failure(e),
    };

    if errors.is_empty() {
        return (
            StatusCode::OK,
            Json(ApiResponse::success(QuizResponse {
                quiz_content: format!("⚠️ 目前找不到您的 {} 科錯題紀錄。", subject),
                publisher: profile.publisher,
            })),
        );
    }

    let settings = match ctx.store.ai_settings(user.user_id).await {
        Ok(settings) => settings.unwrap_or_default(),
        Err(e) => return store_failure(e),
    };

    let grade_text = review::grade_label(profile.grade);
    let prompt = review::quiz_prompt(&profile.publisher, &grade_text, &subject, &errors);

    match ctx.ai.ask(&settings, &prompt).await {
        Ok(quiz) => (
            StatusCode::OK,
            Json(ApiResponse::success(QuizResponse {
                quiz_content: quiz,
                publisher: profile.publisher,
            })),
        ),
        Err(e) => (
            StatusCode::OK,
            Json(ApiResponse::error(format!("AI 老師暫時無法出題: {}", e))),
        ),
    }
}
