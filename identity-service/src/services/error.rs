use axum::http::StatusCode;
use service_core::error::AppError;
use thiserror::Error;

/// Typed errors raised by the credential store, token service, and team
/// membership manager. Each carries a stable code; the conversion into
/// `AppError` below is the only place they become HTTP responses.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account temporarily locked")]
    AccountLocked,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Access denied")]
    AccessDenied,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Not a member of this team")]
    NotMember,

    #[error("User is already a member of this team")]
    AlreadyMember,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidOperation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::InvalidCredentials => "INVALID_CREDENTIALS",
            ServiceError::AccountLocked => "ACCOUNT_LOCKED",
            ServiceError::InvalidToken => "INVALID_TOKEN",
            ServiceError::TokenExpired => "TOKEN_EXPIRED",
            ServiceError::AccessDenied => "ACCESS_DENIED",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::NotMember => "NOT_MEMBER",
            ServiceError::AlreadyMember => "ALREADY_MEMBER",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::InvalidOperation(_) => "INVALID_OPERATION",
            ServiceError::Database(_) => "INTERNAL_ERROR",
            ServiceError::Email(_) => "INTERNAL_ERROR",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) | ServiceError::InvalidOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::InvalidCredentials
            | ServiceError::AccountLocked
            | ServiceError::InvalidToken
            | ServiceError::TokenExpired => StatusCode::UNAUTHORIZED,
            ServiceError::AccessDenied => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) | ServiceError::NotMember => StatusCode::NOT_FOUND,
            ServiceError::AlreadyMember | ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Database(_) | ServiceError::Email(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::Email(e) => AppError::EmailError(e),
            other => AppError::Domain {
                status: other.status(),
                code: other.code(),
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lockout_and_bad_credentials_are_distinct_codes() {
        assert_eq!(ServiceError::AccountLocked.code(), "ACCOUNT_LOCKED");
        assert_eq!(
            ServiceError::InvalidCredentials.code(),
            "INVALID_CREDENTIALS"
        );
        assert_eq!(ServiceError::AccountLocked.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ServiceError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn domain_errors_keep_code_through_app_error() {
        let app: AppError = ServiceError::AlreadyMember.into();
        assert_eq!(app.code(), "ALREADY_MEMBER");
    }
}
