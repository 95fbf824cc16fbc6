use std::sync::Arc;

use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use super::error::AuthError;
use super::storage::AuthStorage;
use super::types::{SessionInfo, VerifiedUser};

const SESSION_TTL_DAYS: i64 = 30;

pub struct Auth {
    storage: Arc<dyn AuthStorage>,
}

impl Auth {
    pub fn new(storage: Arc<dyn AuthStorage>) -> Self {
        Self { storage }
    }

    fn hash_password(password: &str) -> String {
        Sha256::digest(password.as_bytes())
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect()
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::EmptyCredentials);
        }

        if self.storage.get_user(username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        let user_id = self
            .storage
            .create_user(username, &Self::hash_password(password))
            .await?;
        info!("Registered user {} ({})", username, user_id);
        Ok(())
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(VerifiedUser, SessionInfo), AuthError> {
        let user = self
            .storage
            .get_user(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if user.password_hash != Self::hash_password(password) {
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        let session = SessionInfo {
            token: Uuid::new_v4().to_string(),
            user_id: user.id,
            created_at: now,
            expires_at: now + Duration::days(SESSION_TTL_DAYS),
        };
        self.storage.create_session(&session).await?;

        info!("User {} logged in", user.id);
        Ok((
            VerifiedUser {
                user_id: user.id,
                username: user.username,
            },
            session,
        ))
    }

    /// Validates a bearer token and produces the verified identity the
    /// rest of the system trusts as the owner id.
    pub async fn verify_token(&self, header: Option<&str>) -> Result<VerifiedUser, AuthError> {
        let header = header.ok_or(AuthError::MissingToken)?;
        let token = match header.split(' ').last() {
            Some(token) if !token.is_empty() => token,
            _ => return Err(AuthError::InvalidToken),
        };

        let session = self
            .storage
            .get_session(token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if session.expires_at < Utc::now() {
            return Err(AuthError::TokenExpired);
        }

        Ok(VerifiedUser {
            user_id: session.user_id,
            username: session.username,
        })
    }
}
