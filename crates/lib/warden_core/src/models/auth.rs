//! Authentication domain models.
//!
//! These are internal domain models, distinct from the HTTP request/response
//! types in `warden_api` (which carry `#[serde(rename_all = "camelCase")]`).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider name for password-based accounts.
pub const LOCAL_PROVIDER: &str = "local";

/// Token type reported alongside every issued pair.
pub const BEARER: &str = "Bearer";

/// Stored user identity.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    /// Absent for federation-only accounts.
    pub password_hash: Option<String>,
    pub provider: String,
    pub provider_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Public projection, never carrying the password hash.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            provider: self.provider.clone(),
            created_at: self.created_at,
        }
    }
}

/// Public user fields returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub provider: String,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub provider: String,
    pub provider_id: Option<String>,
}

/// Refresh token record stored in the database. Only the hash is kept.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// JWT claims embedded in access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject: user ID.
    pub sub: String,
    pub email: String,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}

/// JWT claims embedded in refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: String,
    /// Random per-issuance id; two tokens for the same user never collide.
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

/// Access + refresh token pair handed to the caller.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

/// Identity asserted by an external provider after its own handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    /// Email the provider has verified.
    pub email: String,
    pub display_name: String,
    /// Provider name stored on newly created users (e.g. `google`).
    pub provider: String,
    pub provider_id: String,
}
