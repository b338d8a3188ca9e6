//! Database models for users.

use crate::types::UserId;
use chrono::{DateTime, Utc};

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub email: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub auth_source: String,
}

/// Sign-in from an identity provider. Creates the account on first sight.
#[derive(Debug, Clone)]
pub struct OAuthUserUpsert {
    pub email: String,
    pub display_name: Option<String>,
    /// Provider name, stored as the account's auth source
    pub provider: String,
}

/// Database response for a user
#[derive(Debug, Clone)]
pub struct UserDBResponse {
    pub id: UserId,
    pub email: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub auth_source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}
