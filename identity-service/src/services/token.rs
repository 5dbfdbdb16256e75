//! JWT issuance and verification.
//!
//! Stateless by design: this service signs and checks tokens but never
//! touches storage. Rotation and revocation are orchestrated by the
//! auth service on top of the session store and the denylist cache.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::User;
use crate::services::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by both token types. `jti` is the session handle for
/// access tokens and the rotation handle for refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(rename = "enterpriseId", skip_serializing_if = "Option::is_none")]
    pub enterprise_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// An access/refresh pair minted for one login or rotation.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub access_jti: Uuid,
    pub refresh_jti: Uuid,
    /// Access-token lifetime in seconds, for the response body.
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    access_expiry: Duration,
    refresh_expiry: Duration,
}

impl TokenService {
    pub fn new(
        secret: &str,
        algorithm: &str,
        access_expiry_minutes: i64,
        refresh_expiry_days: i64,
    ) -> Result<Self, anyhow::Error> {
        let algorithm = match algorithm {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => anyhow::bail!("Unsupported JWT algorithm: {}", other),
        };

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
            access_expiry: Duration::minutes(access_expiry_minutes),
            refresh_expiry: Duration::days(refresh_expiry_days),
        })
    }

    pub fn access_expiry(&self) -> Duration {
        self.access_expiry
    }

    pub fn refresh_expiry(&self) -> Duration {
        self.refresh_expiry
    }

    /// Mint a fresh access/refresh pair for the user. Each token gets
    /// its own jti.
    pub fn issue(&self, user: &User) -> Result<IssuedTokens, ServiceError> {
        let now = Utc::now();
        let access_jti = Uuid::new_v4();
        let refresh_jti = Uuid::new_v4();

        let access = self.sign(user, TokenType::Access, access_jti, now, self.access_expiry)?;
        let refresh = self.sign(
            user,
            TokenType::Refresh,
            refresh_jti,
            now,
            self.refresh_expiry,
        )?;

        Ok(IssuedTokens {
            access_token: access,
            refresh_token: refresh,
            access_jti,
            refresh_jti,
            expires_in: self.access_expiry.num_seconds(),
        })
    }

    fn sign(
        &self,
        user: &User,
        token_type: TokenType,
        jti: Uuid,
        now: chrono::DateTime<Utc>,
        expiry: Duration,
    ) -> Result<String, ServiceError> {
        let claims = TokenClaims {
            user_id: user.user_id,
            username: user.username.clone(),
            email: user.email.clone(),
            enterprise_id: user.enterprise_id,
            token_type,
            jti,
            iat: now.timestamp(),
            exp: (now + expiry).timestamp(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to sign token: {}", e)))
    }

    /// Verify signature and expiry, and reject tokens of the wrong
    /// kind. A refresh token must never pass where an access token is
    /// expected, and vice versa.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<TokenClaims, ServiceError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => ServiceError::TokenExpired,
                _ => ServiceError::InvalidToken,
            }
        })?;

        if data.claims.token_type != expected {
            return Err(ServiceError::InvalidToken);
        }

        Ok(data.claims)
    }
}
