//! Token authority: the only component that signs tokens and touches
//! refresh-token records.
//!
//! Refresh token lifecycle:
//!
//! ```text
//! ISSUED ──redeem──▶ REDEEMED_AND_ROTATED   (row deleted, caller mints a new pair)
//!    │
//!    ├──logout──▶ REVOKED                   (row deleted)
//!    └──time────▶ EXPIRED                   (rejected at redemption)
//! ```
//!
//! None of the terminal states can be left again.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use super::AuthError;
use super::jwt::{self, SigningKeys};
use super::store::CredentialStore;
use crate::config::TokenConfig;
use crate::models::auth::{AccessTokenClaims, BEARER, RefreshTokenClaims, TokenPair};

/// SHA-256 hash (lowercase hex) of a refresh token, as stored.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Lifetimes must be representable and must not push an expiry past the
/// largest instant chrono can hold.
fn ttl(value: std::time::Duration, name: &str) -> Result<Duration, AuthError> {
    Duration::from_std(value)
        .ok()
        .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
        .ok_or_else(|| AuthError::Configuration(format!("{name} is out of range")))
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, AuthError> {
    now.checked_add_signed(ttl)
        .ok_or_else(|| AuthError::Internal("token expiry out of range".into()))
}

pub struct TokenAuthority {
    store: Arc<dyn CredentialStore>,
    access_keys: SigningKeys,
    refresh_keys: SigningKeys,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenAuthority {
    /// Build the authority. Empty secrets are a `Configuration` error.
    pub fn new(store: Arc<dyn CredentialStore>, config: &TokenConfig) -> Result<Self, AuthError> {
        Ok(Self {
            store,
            access_keys: SigningKeys::from_secret("JWT_ACCESS_SECRET", &config.access_secret)?,
            refresh_keys: SigningKeys::from_secret("JWT_REFRESH_SECRET", &config.refresh_secret)?,
            access_ttl: ttl(config.access_ttl, "JWT_ACCESS_EXPIRY")?,
            refresh_ttl: ttl(config.refresh_ttl, "JWT_REFRESH_EXPIRY")?,
        })
    }

    /// Override lifetimes. Negative values mint already-expired tokens.
    pub fn with_ttls(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Sign an access token for `user_id`.
    pub fn issue_access_token(&self, user_id: &str, email: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: expiry(now, self.access_ttl)?.timestamp(),
            iat: now.timestamp(),
        };
        jwt::sign(&claims, &self.access_keys)
    }

    /// Mint a refresh token and persist its hash. The plaintext is returned
    /// once and never stored.
    pub async fn issue_refresh_token(&self, user_id: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let expires_at = expiry(now, self.refresh_ttl)?;
        let claims = RefreshTokenClaims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };
        let token = jwt::sign(&claims, &self.refresh_keys)?;
        self.store
            .insert_refresh_token_hash(user_id, &hash_refresh_token(&token), expires_at)
            .await?;
        Ok(token)
    }

    /// Mint an access + refresh pair.
    pub async fn issue_pair(&self, user_id: &str, email: &str) -> Result<TokenPair, AuthError> {
        let access_token = self.issue_access_token(user_id, email)?;
        let refresh_token = self.issue_refresh_token(user_id).await?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: BEARER,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Check signature and expiry of an access token.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, AuthError> {
        jwt::verify(token, &self.access_keys, true)
    }

    /// Consume a refresh token, returning its owner's id.
    ///
    /// The row is removed by a conditional delete; only the caller that
    /// observes an affected row wins, so concurrent redemptions of one token
    /// yield exactly one success.
    pub async fn redeem_and_rotate_refresh_token(&self, token: &str) -> Result<String, AuthError> {
        let claims: RefreshTokenClaims = jwt::verify(token, &self.refresh_keys, true)?;
        let token_hash = hash_refresh_token(token);

        let record = self
            .store
            .find_refresh_token_by_hash(&token_hash)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;
        if record.user_id != claims.sub {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        if self.store.delete_refresh_token_by_hash(&token_hash).await? == 0 {
            debug!(user_id = %record.user_id, "refresh token already redeemed");
            return Err(AuthError::InvalidOrExpiredToken);
        }

        info!(user_id = %record.user_id, "refresh token redeemed");
        Ok(record.user_id)
    }

    /// Revoke a refresh token (logout). Expired tokens are still accepted as
    /// long as their row exists.
    pub async fn invalidate_refresh_token(&self, token: &str) -> Result<(), AuthError> {
        let claims: RefreshTokenClaims = jwt::verify(token, &self.refresh_keys, false)?;
        let deleted = self
            .store
            .delete_refresh_token_by_hash(&hash_refresh_token(token))
            .await?;
        if deleted == 0 {
            debug!(user_id = %claims.sub, "refresh token not recognised");
            return Err(AuthError::InvalidOrExpiredToken);
        }
        info!(user_id = %claims.sub, "refresh token revoked");
        Ok(())
    }

    /// Revoke every refresh token of a user.
    pub async fn invalidate_all_for_user(&self, user_id: &str) -> Result<u64, AuthError> {
        let revoked = self.store.delete_refresh_tokens_for_user(user_id).await?;
        info!(user_id, revoked, "all refresh tokens revoked");
        Ok(revoked)
    }

    /// Drop rows past their expiry.
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        self.store.purge_expired_refresh_tokens().await
    }
}
