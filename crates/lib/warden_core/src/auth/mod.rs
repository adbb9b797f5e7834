//! Authentication: password hashing, token issuance, credential storage and
//! the session flows built on top of them.

pub mod jwt;
pub mod memory;
pub mod password;
pub mod queries;
pub mod session;
pub mod store;
pub mod tokens;

use thiserror::Error;

/// Unique constraint guarding `users.email`.
const USERS_EMAIL_CONSTRAINT: &str = "users_email_key";

/// Authentication errors.
///
/// Everything except `Configuration` and `StoreUnavailable` is an expected
/// outcome the caller can act on.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("An account with this email already exists")]
    DuplicateIdentity,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Too many requests, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Federated login failed: {0}")]
    Federation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e
            && db.is_unique_violation()
            && db.constraint() == Some(USERS_EMAIL_CONSTRAINT)
        {
            return AuthError::DuplicateIdentity;
        }
        AuthError::StoreUnavailable(e.to_string())
    }
}
