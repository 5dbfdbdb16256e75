//! Auth orchestrator: registration, login, refresh, logout, and the
//! password lifecycle. Composes the credential store, token service,
//! cache, and email provider; the only service that talks to external
//! collaborators.

use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{PasswordResetToken, Session, User, UserResponse};
use crate::repo::CredentialRepo;
use crate::services::audit::{AuditEvent, AuditSink, RiskLevel};
use crate::services::cache::CacheStore;
use crate::services::email::EmailProvider;
use crate::services::error::ServiceError;
use crate::services::password::{
    Password, PasswordHashString, hash_password, verify_legacy_sha256, verify_password,
};
use crate::services::token::{IssuedTokens, TokenClaims, TokenService, TokenType};
use crate::models::PasswordAlgo;

const VERIFY_KEY_PREFIX: &str = "email_verify:";
const DENYLIST_KEY_PREFIX: &str = "denylist:";
const VERIFICATION_TTL_HOURS: i64 = 24;

/// Tunable security knobs, loaded from configuration.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    pub lockout_threshold: i32,
    pub lockout_duration_minutes: i64,
    pub password_reset_ttl_minutes: i64,
    /// Argon2id memory cost in KiB.
    pub password_hash_cost_kib: u32,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            lockout_threshold: 5,
            lockout_duration_minutes: 15,
            password_reset_ttl_minutes: 60,
            password_hash_cost_kib: 19 * 1024,
        }
    }
}

/// Hex-encoded SHA-256, used wherever a bearer secret must be stored.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn new_opaque_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    hex::encode(token_bytes)
}

#[derive(Clone)]
pub struct AuthService {
    repo: Arc<dyn CredentialRepo>,
    tokens: TokenService,
    cache: Arc<dyn CacheStore>,
    email: Arc<dyn EmailProvider>,
    audit: Arc<dyn AuditSink>,
    policy: SecurityPolicy,
}

impl AuthService {
    pub fn new(
        repo: Arc<dyn CredentialRepo>,
        tokens: TokenService,
        cache: Arc<dyn CacheStore>,
        email: Arc<dyn EmailProvider>,
        audit: Arc<dyn AuditSink>,
        policy: SecurityPolicy,
    ) -> Self {
        Self {
            repo,
            tokens,
            cache,
            email,
            audit,
            policy,
        }
    }

    pub fn token_service(&self) -> &TokenService {
        &self.tokens
    }

    /// Register a new account. The user starts in `pending_verification`
    /// and receives an email with a one-shot activation token.
    pub async fn register(
        &self,
        username: String,
        email: String,
        password: String,
    ) -> Result<UserResponse, ServiceError> {
        let hash = hash_password(
            &Password::new(password),
            self.policy.password_hash_cost_kib,
        )?;
        let user = User::new(username, email, hash.into_string());

        self.repo.insert_user(&user).await?;

        let token = new_opaque_token();
        self.cache
            .set(
                &format!("{}{}", VERIFY_KEY_PREFIX, hash_token(&token)),
                &user.user_id.to_string(),
                (VERIFICATION_TTL_HOURS * 3600) as u64,
            )
            .await?;

        if let Err(e) = self
            .email
            .send_verification_email(&user.email, &user.username, &token)
            .await
        {
            warn!(user_id = %user.user_id, "Failed to send verification email: {}", e);
        }

        self.audit
            .record(AuditEvent::success(
                Some(user.user_id),
                "user.register",
                "user",
                Some(user.user_id),
                RiskLevel::Low,
            ))
            .await;

        info!(user_id = %user.user_id, "User registered");
        Ok(user.sanitized())
    }

    /// Consume an email-verification token and activate the account.
    pub async fn verify_email(&self, token: &str) -> Result<UserResponse, ServiceError> {
        let key = format!("{}{}", VERIFY_KEY_PREFIX, hash_token(token));
        let user_id = self
            .cache
            .get(&key)
            .await?
            .and_then(|v| Uuid::parse_str(&v).ok())
            .ok_or(ServiceError::InvalidToken)?;

        if !self.repo.activate_user(user_id).await? {
            return Err(ServiceError::NotFound("User"));
        }
        self.cache.delete(&key).await?;

        let user = self
            .repo
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        if let Err(e) = self
            .email
            .send_welcome_email(&user.email, &user.username)
            .await
        {
            warn!(user_id = %user_id, "Failed to send welcome email: {}", e);
        }

        self.audit
            .record(AuditEvent::success(
                Some(user_id),
                "user.verify_email",
                "user",
                Some(user_id),
                RiskLevel::Low,
            ))
            .await;

        Ok(user.sanitized())
    }

    /// Authenticate and mint a token pair.
    ///
    /// The password is verified before the lock check so a locked
    /// account answers wrong-password attempts exactly like an unlocked
    /// one. A correct password against a locked account gets the
    /// distinct locked error.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(UserResponse, IssuedTokens), ServiceError> {
        let Some(user) = self.repo.find_user_by_username(username).await? else {
            // burn comparable time so absent users are not distinguishable
            let _ = verify_legacy_sha256(&Password::new(password.to_string()), "00");
            return Err(ServiceError::InvalidCredentials);
        };

        let password = Password::new(password.to_string());
        let verified = self.verify_stored_password(&user, &password).await?;

        if !verified {
            let failure = self
                .repo
                .record_login_failure(
                    user.user_id,
                    self.policy.lockout_threshold,
                    Duration::minutes(self.policy.lockout_duration_minutes),
                )
                .await?;

            if failure.attempts >= self.policy.lockout_threshold {
                self.audit
                    .record(AuditEvent::failure(
                        Some(user.user_id),
                        "user.locked",
                        "user",
                        Some(user.user_id),
                        RiskLevel::High,
                    ))
                    .await;
            }

            self.audit
                .record(AuditEvent::failure(
                    Some(user.user_id),
                    "user.login",
                    "user",
                    Some(user.user_id),
                    RiskLevel::Medium,
                ))
                .await;
            return Err(ServiceError::InvalidCredentials);
        }

        if user.is_locked() {
            self.audit
                .record(AuditEvent::failure(
                    Some(user.user_id),
                    "user.login",
                    "user",
                    Some(user.user_id),
                    RiskLevel::High,
                ))
                .await;
            return Err(ServiceError::AccountLocked);
        }

        if !user.is_active() {
            return Err(ServiceError::InvalidCredentials);
        }

        self.repo.record_login_success(user.user_id).await?;

        let tokens = self.tokens.issue(&user)?;
        let session = Session::new(
            user.user_id,
            tokens.access_jti.to_string(),
            hash_token(&tokens.refresh_token),
            ip_address,
            user_agent,
            self.tokens.refresh_expiry().num_days(),
        );
        self.repo.insert_session(&session).await?;

        self.audit
            .record(AuditEvent::success(
                Some(user.user_id),
                "user.login",
                "user",
                Some(user.user_id),
                RiskLevel::Low,
            ))
            .await;

        info!(user_id = %user.user_id, "Login successful");
        Ok((user.sanitized(), tokens))
    }

    /// Verify the presented password against the stored hash, honoring
    /// the record's declared algorithm. Legacy hashes are upgraded to
    /// argon2id on a successful match.
    async fn verify_stored_password(
        &self,
        user: &User,
        password: &Password,
    ) -> Result<bool, ServiceError> {
        match user.algo() {
            Some(PasswordAlgo::Argon2id) => Ok(verify_password(
                password,
                &PasswordHashString::new(user.password_hash.clone()),
            )
            .is_ok()),
            Some(PasswordAlgo::LegacySha256) => {
                if !verify_legacy_sha256(password, &user.password_hash) {
                    return Ok(false);
                }
                let upgraded = hash_password(password, self.policy.password_hash_cost_kib)?;
                self.repo
                    .upgrade_password_hash(
                        user.user_id,
                        upgraded.as_str(),
                        PasswordAlgo::Argon2id,
                    )
                    .await?;
                info!(user_id = %user.user_id, "Upgraded legacy password hash");
                Ok(true)
            }
            None => Err(ServiceError::Internal(anyhow::anyhow!(
                "Unknown password algorithm: {}",
                user.password_algo
            ))),
        }
    }

    /// Exchange a refresh token for a new pair. Single-use: the session
    /// holding the presented token is claimed and replaced in one
    /// repository transaction, so of two concurrent calls with the same
    /// token exactly one succeeds.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<IssuedTokens, ServiceError> {
        let claims = self.tokens.verify(refresh_token, TokenType::Refresh)?;

        let user = self
            .repo
            .find_user_by_id(claims.user_id)
            .await?
            .ok_or(ServiceError::InvalidToken)?;
        if !user.is_active() {
            return Err(ServiceError::InvalidToken);
        }

        let tokens = self.tokens.issue(&user)?;
        let replacement = Session::new(
            user.user_id,
            tokens.access_jti.to_string(),
            hash_token(&tokens.refresh_token),
            ip_address,
            user_agent,
            self.tokens.refresh_expiry().num_days(),
        );

        let claimed = self
            .repo
            .rotate_session(&hash_token(refresh_token), &replacement)
            .await?;

        if claimed.is_none() {
            self.audit
                .record(AuditEvent::failure(
                    Some(user.user_id),
                    "session.refresh_replay",
                    "session",
                    None,
                    RiskLevel::High,
                ))
                .await;
            return Err(ServiceError::InvalidToken);
        }

        self.audit
            .record(AuditEvent::success(
                Some(user.user_id),
                "session.refresh",
                "session",
                Some(replacement.session_id),
                RiskLevel::Low,
            ))
            .await;

        Ok(tokens)
    }

    /// Invalidate the current session and denylist the access token for
    /// its remaining lifetime, so stateless verification rejects it too.
    pub async fn logout(&self, claims: &TokenClaims) -> Result<(), ServiceError> {
        self.repo
            .delete_session_by_token(&claims.jti.to_string())
            .await?;

        let remaining = claims.exp - Utc::now().timestamp();
        if remaining > 0 {
            self.cache
                .set(
                    &format!("{}{}", DENYLIST_KEY_PREFIX, claims.jti),
                    "revoked",
                    remaining as u64,
                )
                .await?;
        }

        self.audit
            .record(AuditEvent::success(
                Some(claims.user_id),
                "user.logout",
                "session",
                None,
                RiskLevel::Low,
            ))
            .await;

        Ok(())
    }

    /// Whether an access token jti has been revoked before expiry.
    pub async fn is_denylisted(&self, jti: Uuid) -> Result<bool, ServiceError> {
        self.cache
            .exists(&format!("{}{}", DENYLIST_KEY_PREFIX, jti))
            .await
    }

    pub async fn cache_health(&self) -> Result<(), ServiceError> {
        self.cache.health_check().await
    }

    /// Start a password reset. Always succeeds from the caller's point
    /// of view; whether the email exists is never disclosed.
    pub async fn forgot_password(&self, email: &str) -> Result<(), ServiceError> {
        let Some(user) = self.repo.find_user_by_email(email).await? else {
            return Ok(());
        };

        let token = new_opaque_token();
        let reset = PasswordResetToken::new(
            user.user_id,
            hash_token(&token),
            self.policy.password_reset_ttl_minutes,
        );
        self.repo.insert_password_reset(&reset).await?;

        if let Err(e) = self
            .email
            .send_password_reset_email(&user.email, &user.username, &token)
            .await
        {
            warn!(user_id = %user.user_id, "Failed to send reset email: {}", e);
        }

        self.audit
            .record(AuditEvent::success(
                None,
                "user.forgot_password",
                "user",
                Some(user.user_id),
                RiskLevel::Medium,
            ))
            .await;

        Ok(())
    }

    /// Complete a password reset. The token is consumed atomically, so
    /// a second use fails even under concurrent submissions. All
    /// existing sessions for the user are revoked.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: String,
    ) -> Result<(), ServiceError> {
        let reset = self
            .repo
            .consume_password_reset(&hash_token(token))
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        let hash = hash_password(
            &Password::new(new_password),
            self.policy.password_hash_cost_kib,
        )?;
        self.repo
            .set_password(reset.user_id, hash.as_str(), PasswordAlgo::Argon2id)
            .await?;

        self.audit
            .record(AuditEvent::success(
                Some(reset.user_id),
                "user.reset_password",
                "user",
                Some(reset.user_id),
                RiskLevel::High,
            ))
            .await;

        info!(user_id = %reset.user_id, "Password reset completed");
        Ok(())
    }

    /// Change the password of an authenticated user. Requires the
    /// current password; revokes every session on success.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: String,
    ) -> Result<(), ServiceError> {
        let user = self
            .repo
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        let current = Password::new(current_password.to_string());
        if !self.verify_stored_password(&user, &current).await? {
            return Err(ServiceError::InvalidCredentials);
        }

        let hash = hash_password(
            &Password::new(new_password),
            self.policy.password_hash_cost_kib,
        )?;
        self.repo
            .set_password(user_id, hash.as_str(), PasswordAlgo::Argon2id)
            .await?;

        self.audit
            .record(AuditEvent::success(
                Some(user_id),
                "user.change_password",
                "user",
                Some(user_id),
                RiskLevel::High,
            ))
            .await;

        Ok(())
    }

    /// Sweep expired sessions and reset tokens. Idempotent; safe to run
    /// from several workers at once.
    pub async fn sweep_expired(&self) -> Result<(u64, u64), ServiceError> {
        let sessions = self.repo.delete_expired_sessions().await?;
        let resets = self.repo.delete_expired_password_resets().await?;
        if sessions > 0 || resets > 0 {
            info!(sessions, resets, "Swept expired credentials");
        }
        Ok((sessions, resets))
    }
}
