//! PostgreSQL credential store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::AuthError;
use super::store::CredentialStore;
use crate::models::auth::{NewUser, RefreshTokenRecord, User};
use crate::uuid::uuidv7;

/// (id, email, name, password_hash, provider, provider_id, created_at, updated_at)
type UserRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

/// (id, user_id, token_hash, expires_at, created_at)
type RefreshTokenRow = (String, String, String, DateTime<Utc>, DateTime<Utc>);

fn user_from_row(row: UserRow) -> User {
    let (id, email, name, password_hash, provider, provider_id, created_at, updated_at) = row;
    User {
        id,
        email,
        name,
        password_hash,
        provider,
        provider_id,
        created_at,
        updated_at,
    }
}

fn refresh_token_from_row(row: RefreshTokenRow) -> RefreshTokenRecord {
    let (id, user_id, token_hash, expires_at, created_at) = row;
    RefreshTokenRecord {
        id,
        user_id,
        token_hash,
        expires_at,
        created_at,
    }
}

/// `CredentialStore` backed by the `users` and `refresh_tokens` tables.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id::text, email, name, password_hash, provider, provider_id, \
                    created_at, updated_at \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        let Ok(id) = Uuid::parse_str(user_id) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id::text, email, name, password_hash, provider, provider_id, \
                    created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<User, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (email, name, password_hash, provider, provider_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id::text, email, name, password_hash, provider, provider_id, \
                       created_at, updated_at",
        )
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.password_hash)
        .bind(&new_user.provider)
        .bind(&new_user.provider_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(user_from_row(row))
    }

    async fn insert_refresh_token_hash(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, AuthError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2::uuid, $3, $4) \
             RETURNING id::text, user_id::text, token_hash, expires_at, created_at",
        )
        .bind(uuidv7())
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(refresh_token_from_row(row))
    }

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            "SELECT id::text, user_id::text, token_hash, expires_at, created_at \
             FROM refresh_tokens \
             WHERE token_hash = $1 AND expires_at > now()",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(refresh_token_from_row))
    }

    async fn delete_refresh_token_by_hash(&self, token_hash: &str) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_refresh_tokens_for_user(&self, user_id: &str) -> Result<u64, AuthError> {
        let Ok(id) = Uuid::parse_str(user_id) else {
            return Ok(0);
        };
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn purge_expired_refresh_tokens(&self) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
