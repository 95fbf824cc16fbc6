use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::auth::VerifiedUser;
use crate::review;
use crate::store::types::parse_date;
use crate::store::ReviewFilter;
use crate::web::{store_failure, ApiResponse};
use crate::AppContext;

pub fn review_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/list", get(review_list))
        .route("/ai_diagnose", post(ai_diagnose))
        .route("/toggle", post(toggle_corrected))
        .with_state(ctx)
}

#[derive(Debug, Deserialize)]
struct ReviewQuery {
    #[serde(default)]
    subject: String,
    start: Option<String>,
    end: Option<String>,
}

fn build_filter(query: &ReviewQuery) -> Result<ReviewFilter, crate::store::StoreError> {
    Ok(ReviewFilter {
        subject: query.subject.clone(),
        start: query.start.as_deref().map(parse_date).transpose()?,
        end: query.end.as_deref().map(parse_date).transpose()?,
    })
}

async fn review_list(
    State(ctx): State<Arc<AppContext>>,
    Extension(user): Extension<VerifiedUser>,
    Query(query): Query<ReviewQuery>,
) -> (StatusCode, Json<ApiResponse<Vec<review::ReviewEntry>>>) {
    let filter = match build_filter(&query) {
        Ok(filter) => filter,
        Err(e) => return store_failure(e),
    };

    match ctx.store.review_rows(user.user_id, &filter).await {
        Ok(rows) => (
            StatusCode::OK,
            Json(ApiResponse::success(review::build_review_entries(rows))),
        ),
        Err(e) => store_failure(e),
    }
}

#[derive(Debug, Deserialize)]
struct DiagnoseRequest {
    id: Option<i64>,
    subject: Option<String>,
    unit: Option<String>,
    note: Option<String>,
}

#[derive(Debug, Serialize)]
struct DiagnoseResponse {
    insight: String,
}

async fn ai_diagnose(
    State(ctx): State<Arc<AppContext>>,
    Extension(user): Extension<VerifiedUser>,
    Json(req): Json<DiagnoseRequest>,
) -> (StatusCode, Json<ApiResponse<DiagnoseResponse>>) {
    let subject = req.subject.unwrap_or_else(|| "社會".to_string());
    let unit = req.unit.unwrap_or_default();
    let note = req.note.unwrap_or_default();

    info!("Running AI diagnosis for progress {:?}", req.id);

    let profile = match ctx.store.subject_profile(user.user_id, &subject).await {
        Ok(profile) => profile,
        Err(e) => return store_failure(e),
    };
    let settings = match ctx.store.ai_settings(user.user_id).await {
        Ok(settings) => settings.unwrap_or_default(),
        Err(e) => return store_failure(e),
    };

    let grade_text = review::grade_label(profile.grade);
    let prompt = review::diagnosis_prompt(&grade_text, &profile.publisher, &subject, &unit, &note);

    let insight = match ctx.ai.ask(&settings, &prompt).await {
        Ok(text) => text,
        // Provider failures are surfaced in the insight field and
        // nothing is persisted.
        Err(e) => {
            return (
                StatusCode::OK,
                Json(ApiResponse::success(DiagnoseResponse {
                    insight: format!("💡 {}", e),
                })),
            );
        }
    };

    if let Some(progress_id) = req.id {
        if let Err(e) = ctx.store.save_insight(user.user_id, progress_id, &insight).await {
            return store_failure(e);
        }
        info!("Stored AI insight for progress {}", progress_id);
    }

    (
        StatusCode::OK,
        Json(ApiResponse::success(DiagnoseResponse { insight })),
    )
}

#[derive(Debug, Deserialize)]
struct ToggleRequest {
    id: i64,
    is_corrected: bool,
}

#[derive(Debug, Serialize)]
struct ToggleResponse {
    id: i64,
    new_status: bool,
}

async fn toggle_corrected(
    State(ctx): State<Arc<AppContext>>,
    Extension(user): Extension<VerifiedUser>,
    Json(req): Json<ToggleRequest>,
) -> impl IntoResponse {
    match ctx.store.set_corrected(user.user_id, req.id, req.is_corrected).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(ToggleResponse {
                id: req.id,
                new_status: req.is_corrected,
            })),
        ),
        Err(e) => store_failure(e),
    }
}
