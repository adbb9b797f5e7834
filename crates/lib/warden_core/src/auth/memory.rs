//! In-process credential store.
//!
//! Backs tests and local development. Each map operation takes the shard
//! lock of the key it touches, so the email-uniqueness check and the
//! refresh-token delete are both atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::AuthError;
use super::store::CredentialStore;
use crate::models::auth::{NewUser, RefreshTokenRecord, User};
use crate::uuid::uuidv7;

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: DashMap<String, User>,
    /// email -> user id
    emails: DashMap<String, String>,
    /// token hash -> record
    refresh_tokens: DashMap<String, RefreshTokenRecord>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of refresh token rows currently held, expired ones included.
    pub fn refresh_token_count(&self) -> usize {
        self.refresh_tokens.len()
    }

    fn remove_tokens_where(&self, pred: impl Fn(&RefreshTokenRecord) -> bool) -> u64 {
        let doomed: Vec<String> = self
            .refresh_tokens
            .iter()
            .filter(|entry| pred(entry.value()))
            .map(|entry| entry.key().clone())
            .collect();
        doomed
            .iter()
            .filter(|hash| self.refresh_tokens.remove(*hash).is_some())
            .count() as u64
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let Some(user_id) = self.emails.get(email).map(|id| id.value().clone()) else {
            return Ok(None);
        };
        Ok(self.users.get(&user_id).map(|u| u.value().clone()))
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users.get(user_id).map(|u| u.value().clone()))
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<User, AuthError> {
        match self.emails.entry(new_user.email.clone()) {
            Entry::Occupied(_) => Err(AuthError::DuplicateIdentity),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let user = User {
                    id: Uuid::new_v4().to_string(),
                    email: new_user.email,
                    name: new_user.name,
                    password_hash: new_user.password_hash,
                    provider: new_user.provider,
                    provider_id: new_user.provider_id,
                    created_at: now,
                    updated_at: now,
                };
                self.users.insert(user.id.clone(), user.clone());
                slot.insert(user.id.clone());
                Ok(user)
            }
        }
    }

    async fn insert_refresh_token_hash(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, AuthError> {
        if !self.users.contains_key(user_id) {
            return Err(AuthError::NotFound(format!("user {user_id}")));
        }
        let record = RefreshTokenRecord {
            id: uuidv7().to_string(),
            user_id: user_id.to_string(),
            token_hash: token_hash.to_string(),
            expires_at,
            created_at: Utc::now(),
        };
        match self.refresh_tokens.entry(token_hash.to_string()) {
            Entry::Occupied(_) => Err(AuthError::Internal("refresh token hash collision".into())),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let now = Utc::now();
        Ok(self
            .refresh_tokens
            .get(token_hash)
            .filter(|r| r.expires_at > now)
            .map(|r| r.value().clone()))
    }

    async fn delete_refresh_token_by_hash(&self, token_hash: &str) -> Result<u64, AuthError> {
        Ok(u64::from(self.refresh_tokens.remove(token_hash).is_some()))
    }

    async fn delete_refresh_tokens_for_user(&self, user_id: &str) -> Result<u64, AuthError> {
        Ok(self.remove_tokens_where(|r| r.user_id == user_id))
    }

    async fn purge_expired_refresh_tokens(&self) -> Result<u64, AuthError> {
        let now = Utc::now();
        Ok(self.remove_tokens_where(|r| r.expires_at <= now))
    }
}
