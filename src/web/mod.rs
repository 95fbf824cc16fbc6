use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::info;

pub mod handlers;

use crate::store::StoreError;
use crate::AppContext;

/// JSON envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Status mapping for store failures. `Unauthorized` is reported as
/// not-found so responses never reveal whether a row exists.
pub fn store_error_status(error: &StoreError) -> StatusCode {
    match error {
        StoreError::Validation(_) => StatusCode::BAD_REQUEST,
        StoreError::NotFound | StoreError::Unauthorized => StatusCode::NOT_FOUND,
        StoreError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn store_error_message(error: &StoreError) -> String {
    match error {
        StoreError::NotFound | StoreError::Unauthorized => "not found".to_string(),
        other => other.to_string(),
    }
}

/// Uniform failure response for handlers talking to the store.
pub fn store_failure<T: Serialize>(error: StoreError) -> (StatusCode, axum::Json<ApiResponse<T>>) {
    tracing::error!("Store operation failed: {}", error);
    (
        store_error_status(&error),
        axum::Json(ApiResponse::error(store_error_message(&error))),
    )
}

pub async fn start_server(ctx: Arc<AppContext>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = handlers::router(ctx);

    info!("Starting server on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
