#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use selfstudy_rs::ai::GeminiProvider;
use selfstudy_rs::auth::{Auth, SqliteAuthStorage};
use selfstudy_rs::store::SqliteStudyStore;
use selfstudy_rs::utils::logger;
use selfstudy_rs::{init_env, AppContext, LISTEN_ADDR, SQLITE_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = logger::init("./logs".to_string())?;
    init_env();

    info!("Starting self-study service...");

    info!("Initializing Storage...");
    let store = SqliteStudyStore::new(&SQLITE_PATH).await?;

    info!("Initializing Auth Manager...");
    let auth_storage = SqliteAuthStorage::new(store.pool().clone())
        .await
        .map_err(|e| anyhow::anyhow!("auth storage init failed: {}", e))?;
    let auth = Auth::new(Arc::new(auth_storage));

    let ctx = Arc::new(AppContext {
        auth: Arc::new(auth),
        store: Arc::new(store),
        ai: Arc::new(GeminiProvider::new()),
    });

    let addr: SocketAddr = LISTEN_ADDR.parse()?;
    info!("Starting HTTP server at http://{}", addr);

    match selfstudy_rs::web::start_server(ctx, addr).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            tracing::error!("Server error: {}", e);
            return Err(e);
        }
    }

    Ok(())
}
