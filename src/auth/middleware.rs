use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};

use super::{Auth, AuthError};
use crate::web::ApiResponse;

/// Validates the bearer token and attaches the verified identity to the
/// request; every protected handler reads the owner id from there.
pub async fn auth_middleware(
    State(auth): State<Arc<Auth>>,
    mut req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ApiResponse<()>>)> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match auth.verify_token(header).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            Ok(next.run(req).await)
        }
        Err(e) => {
            let (status, message) = match e {
                AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing token"),
                AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
                AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token has expired"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
            };
            Err((status, Json(ApiResponse::error(message.to_string()))))
        }
    }
}
