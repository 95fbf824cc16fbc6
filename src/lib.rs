pub mod ai;
pub mod auth;
pub mod review;
pub mod store;
pub mod utils;
pub mod web;

use std::{env, sync::Arc};

use ai::AiProvider;
use auth::Auth;
use once_cell::sync::Lazy;
use store::StudyStore;

pub struct AppContext {
    pub auth: Arc<Auth>,
    pub store: Arc<dyn StudyStore>,
    pub ai: Arc<dyn AiProvider>,
}

const STUDY_SQLITE_PATH: &str = "sqlite://./study_data/database/storage.db?mode=rwc";
const STUDY_LISTEN_ADDR: &str = "127.0.0.1:7100";

pub static SQLITE_PATH: Lazy<String> = Lazy::new(|| {
    match env::var("STUDY_SQLITE_PATH") {
        Ok(path) => path,
        Err(_) => {
            dotenv::var("STUDY_SQLITE_PATH").unwrap_or_else(|_| STUDY_SQLITE_PATH.to_string())
        }
    }
});

pub static LISTEN_ADDR: Lazy<String> = Lazy::new(|| {
    match env::var("STUDY_LISTEN_ADDR") {
        Ok(addr) => addr,
        Err(_) => {
            dotenv::var("STUDY_LISTEN_ADDR").unwrap_or_else(|_| STUDY_LISTEN_ADDR.to_string())
        }
    }
});

pub fn init_env() {
    dotenv::dotenv().ok();

    // Make sure the database directory exists before sqlite opens it.
    if let Some(db_path) = SQLITE_PATH.strip_prefix("sqlite://") {
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        if let Some(dir) = std::path::Path::new(db_path).parent() {
            std::fs::create_dir_all(dir).unwrap_or_else(|e| {
                eprintln!("Failed to create database directory: {}", e);
            });
        }
    }
}
