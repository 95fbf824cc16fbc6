use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
pub struct UserAccount {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionInfo {
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A session joined with its account, as needed for verification.
#[derive(Clone, Debug)]
pub struct SessionRecord {
    pub user_id: i64,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Identity asserted by the auth middleware. Handlers take the owner id
/// from here, never from request payloads.
#[derive(Clone, Debug, Serialize)]
pub struct VerifiedUser {
    pub user_id: i64,
    pub username: String,
}
