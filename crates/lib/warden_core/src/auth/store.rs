//! Credential store abstraction.
//!
//! The durable store is the single source of truth for refresh-token
//! validity. Implementations must make `delete_refresh_token_by_hash` an
//! atomic conditional delete: of two concurrent calls for the same hash, at
//! most one may report an affected row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::AuthError;
use crate::models::auth::{NewUser, RefreshTokenRecord, User};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch a user by (normalized) email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    /// Fetch a user by id. Ids that cannot exist resolve to `None`.
    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError>;

    /// Create a user. A taken email yields `DuplicateIdentity`.
    async fn insert_user(&self, new_user: NewUser) -> Result<User, AuthError>;

    /// Persist the hash of a freshly minted refresh token.
    async fn insert_refresh_token_hash(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, AuthError>;

    /// Look up a refresh token by hash. Expired rows are not returned.
    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError>;

    /// Delete a refresh token by hash, returning the affected row count.
    async fn delete_refresh_token_by_hash(&self, token_hash: &str) -> Result<u64, AuthError>;

    /// Delete every refresh token owned by a user.
    async fn delete_refresh_tokens_for_user(&self, user_id: &str) -> Result<u64, AuthError>;

    /// Remove rows whose expiry has passed.
    async fn purge_expired_refresh_tokens(&self) -> Result<u64, AuthError>;
}
