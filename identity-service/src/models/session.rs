//! Session model - one row per issued token pair.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Session entity.
///
/// `session_token` is the access-token jti; the refresh token is stored
/// only as a SHA-256 hash. A row is consumed exactly once by rotation:
/// the claim of the old row and the insert of its replacement are a
/// single repository operation.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub session_token: String,
    pub refresh_token_hash: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        user_id: Uuid,
        session_token: String,
        refresh_token_hash: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
        expiry_days: i64,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id,
            session_token,
            refresh_token_hash,
            ip_address,
            user_agent,
            expires_at: Utc::now() + Duration::days(expiry_days),
            revoked_at: None,
            created_at: Utc::now(),
        }
    }

    /// Check if session is valid (not expired, not revoked).
    pub fn is_valid(&self) -> bool {
        self.revoked_at.is_none() && self.expires_at > Utc::now()
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}
