use axum::{middleware, Router};
use std::sync::Arc;

use crate::auth::auth_middleware;
use crate::AppContext;

pub mod auth;
pub mod config;
pub mod progress;
pub mod review;
pub mod tasks;
pub mod teacher;

pub fn router(ctx: Arc<AppContext>) -> Router {
    let protected = Router::new()
        .nest("/tasks", tasks::task_router(ctx.clone()))
        .nest("/progress", progress::progress_router(ctx.clone()))
        .nest("/config", config::config_router(ctx.clone()))
        .nest("/review", review::review_router(ctx.clone()))
        .nest("/teacher", teacher::teacher_router(ctx.clone()))
        .layer(middleware::from_fn_with_state(
            ctx.auth.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/auth", auth::auth_router(ctx.auth.clone()))
        .merge(protected)
}
