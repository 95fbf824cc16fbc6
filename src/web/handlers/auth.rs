use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::auth::{Auth, AuthError};
use crate::web::ApiResponse;

pub fn auth_router(auth: Arc<Auth>) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .with_state(auth)
}

#[derive(Debug, Deserialize)]
struct CredentialsRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    user_id: i64,
    username: String,
    token: String,
}

fn auth_error_response(e: AuthError) -> (StatusCode, String) {
    match e {
        AuthError::EmptyCredentials => (StatusCode::BAD_REQUEST, "帳號與密碼不能為空".to_string()),
        AuthError::UsernameTaken => (StatusCode::CONFLICT, "帳號已存在".to_string()),
        AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "帳號或密碼錯誤".to_string()),
        other => {
            error!("Auth failure: {}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

async fn register(
    State(auth): State<Arc<Auth>>,
    Json(req): Json<CredentialsRequest>,
) -> impl IntoResponse {
    match auth.register(&req.username, &req.password).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(ApiResponse::success("註冊成功".to_string())),
        ),
        Err(e) => {
            let (status, message) = auth_error_response(e);
            (status, Json(ApiResponse::error(message)))
        }
    }
}

async fn login(
    State(auth): State<Arc<Auth>>,
    Json(req): Json<CredentialsRequest>,
) -> impl IntoResponse {
    match auth.login(&req.username, &req.password).await {
        Ok((user, session)) => (
            StatusCode::OK,
            Json(ApiResponse::success(LoginResponse {
                user_id: user.user_id,
                username: user.username,
                token: session.token,
            })),
        ),
        Err(e) => {
            let (status, message) = auth_error_response(e);
            (status, Json(ApiResponse::error(message)))
        }
    }
}
