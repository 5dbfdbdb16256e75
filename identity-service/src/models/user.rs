//! User model - account identity and lockout state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User state codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    PendingVerification,
    Active,
    Inactive,
    Suspended,
    Deleted,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::PendingVerification => "pending_verification",
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
            UserStatus::Deleted => "deleted",
        }
    }
}

/// Password hash versioning. The legacy variant exists only as a
/// migration path: hashes are upgraded to argon2id on the next
/// successful login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordAlgo {
    Argon2id,
    LegacySha256,
}

impl PasswordAlgo {
    pub fn as_str(&self) -> &'static str {
        match self {
            PasswordAlgo::Argon2id => "argon2id",
            PasswordAlgo::LegacySha256 => "legacy_sha256",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "argon2id" => Some(PasswordAlgo::Argon2id),
            "legacy_sha256" => Some(PasswordAlgo::LegacySha256),
            _ => None,
        }
    }
}

/// User entity.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub password_algo: String,
    pub status_code: String,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub email_verified: bool,
    pub enterprise_id: Option<Uuid>,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user pending email verification.
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            password_algo: PasswordAlgo::Argon2id.as_str().to_string(),
            status_code: UserStatus::PendingVerification.as_str().to_string(),
            failed_login_attempts: 0,
            locked_until: None,
            email_verified: false,
            enterprise_id: None,
            password_changed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status_code == UserStatus::Active.as_str()
    }

    /// Whether the account is currently in a lockout window.
    pub fn is_locked(&self) -> bool {
        matches!(self.locked_until, Some(until) if until > Utc::now())
    }

    pub fn algo(&self) -> Option<PasswordAlgo> {
        PasswordAlgo::parse(&self.password_algo)
    }

    /// Convert to sanitized response (no credential fields).
    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self.clone())
    }
}

/// User response for API (without credential fields).
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub status: String,
    pub email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            username: u.username,
            email: u.email,
            status: u.status_code,
            email_verified: u.email_verified,
            enterprise_id: u.enterprise_id,
            created_at: u.created_at,
        }
    }
}
