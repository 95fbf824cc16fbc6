use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::info;

use super::error::AuthError;
use super::types::{SessionInfo, SessionRecord, UserAccount};

#[async_trait]
pub trait AuthStorage: Send + Sync + 'static {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<i64, AuthError>;
    async fn get_user(&self, username: &str) -> Result<Option<UserAccount>, AuthError>;
    async fn create_session(&self, session: &SessionInfo) -> Result<(), AuthError>;
    async fn get_session(&self, token: &str) -> Result<Option<SessionRecord>, AuthError>;
}

pub struct SqliteAuthStorage {
    pool: SqlitePool,
}

impl SqliteAuthStorage {
    pub async fn new(pool: SqlitePool) -> Result<Self, AuthError> {
        info!("Initializing SQLite auth storage");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl AuthStorage for SqliteAuthStorage {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<i64, AuthError> {
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn get_user(&self, username: &str) -> Result<Option<UserAccount>, AuthError> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let created_at: String = row.get("created_at");
            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| AuthError::StorageError(e.to_string()))?
                .with_timezone(&Utc);
            Ok(UserAccount {
                id: row.get("id"),
                username: row.get("username"),
                password_hash: row.get("password_hash"),
                created_at,
            })
        })
        .transpose()
    }

    async fn create_session(&self, session: &SessionInfo) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.token)
        .bind(session.user_id)
        .bind(session.created_at.to_rfc3339())
        .bind(session.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Option<SessionRecord>, AuthError> {
        let row = sqlx::query(
            r#"
            SELECT s.user_id, u.username, s.expires_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let expires_at: String = row.get("expires_at");
            let expires_at = DateTime::parse_from_rfc3339(&expires_at)
                .map_err(|e| AuthError::StorageError(e.to_string()))?
                .with_timezone(&Utc);
            Ok(SessionRecord {
                user_id: row.get("user_id"),
                username: row.get("username"),
                expires_at,
            })
        })
        .transpose()
    }
}
