//! Password reset token model.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Password reset token entity. Stored as a hash; valid for one hour
/// and exactly one use.
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub reset_id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn new(user_id: Uuid, token_hash: String, ttl_minutes: i64) -> Self {
        Self {
            reset_id: Uuid::new_v4(),
            user_id,
            token_hash,
            expires_at: Utc::now() + Duration::minutes(ttl_minutes),
            used_at: None,
            created_at: Utc::now(),
        }
    }

    /// A token with non-null used_at or past expiry is never accepted.
    pub fn is_usable(&self) -> bool {
        self.used_at.is_none() && self.expires_at > Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn used_token_is_not_usable() {
        let mut t = PasswordResetToken::new(Uuid::new_v4(), "h".into(), 60);
        assert!(t.is_usable());
        t.used_at = Some(Utc::now());
        assert!(!t.is_usable());
    }

    #[test]
    fn expired_token_is_not_usable() {
        let mut t = PasswordResetToken::new(Uuid::new_v4(), "h".into(), 60);
        t.expires_at = Utc::now() - Duration::seconds(1);
        assert!(!t.is_usable());
    }
}
