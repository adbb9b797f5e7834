//! Session flows: register, login, refresh, logout and federated login.

use std::sync::Arc;

use tracing::{debug, info};

use super::AuthError;
use super::password;
use super::store::CredentialStore;
use super::tokens::TokenAuthority;
use crate::models::auth::{
    FederatedIdentity, LOCAL_PROVIDER, NewUser, Session, TokenPair, UserProfile,
};

/// Lowercased, trimmed email used as the identity key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn hash_blocking(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| AuthError::Internal(format!("password hashing task: {e}")))?
}

async fn verify_blocking(password: String, digest: Option<String>) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || match digest {
        Some(digest) => password::verify_password(&password, &digest),
        None => password::verify_against_dummy(&password),
    })
    .await
    .map_err(|e| AuthError::Internal(format!("password verification task: {e}")))
}

pub struct SessionService {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenAuthority>,
}

impl SessionService {
    pub fn new(store: Arc<dyn CredentialStore>, tokens: Arc<TokenAuthority>) -> Self {
        Self { store, tokens }
    }

    pub fn tokens(&self) -> &TokenAuthority {
        &self.tokens
    }

    /// Create a local account. Returns the profile only; no tokens are issued.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<UserProfile, AuthError> {
        let email = normalize_email(email);
        if self.store.find_user_by_email(&email).await?.is_some() {
            debug!(email = %email, "registration rejected: email taken");
            return Err(AuthError::DuplicateIdentity);
        }

        let password_hash = hash_blocking(password.to_string()).await?;
        let user = self
            .store
            .insert_user(NewUser {
                email,
                name: name.trim().to_string(),
                password_hash: Some(password_hash),
                provider: LOCAL_PROVIDER.to_string(),
                provider_id: None,
            })
            .await?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user.profile())
    }

    /// Authenticate with email + password.
    ///
    /// Unknown email, passwordless account and wrong password all produce the
    /// same `InvalidCredentials`.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        let user = self.store.find_user_by_email(&email).await?;
        let digest = user.as_ref().and_then(|u| u.password_hash.clone());

        let valid = verify_blocking(password.to_string(), digest).await?;
        let user = match user {
            Some(user) if valid => user,
            _ => {
                debug!(email = %email, "login rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let tokens = self.tokens.issue_pair(&user.id, &user.email).await?;
        info!(user_id = %user.id, "user logged in");
        Ok(Session {
            user: user.profile(),
            tokens,
        })
    }

    /// Exchange a refresh token for a new pair. The presented token is dead
    /// afterwards.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let user_id = self
            .tokens
            .redeem_and_rotate_refresh_token(refresh_token)
            .await?;
        let user = self
            .store
            .find_user_by_id(&user_id)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;
        self.tokens.issue_pair(&user.id, &user.email).await
    }

    /// Revoke one refresh token.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.tokens.invalidate_refresh_token(refresh_token).await
    }

    /// Revoke every refresh token of the user.
    pub async fn logout_all(&self, user_id: &str) -> Result<u64, AuthError> {
        self.tokens.invalidate_all_for_user(user_id).await
    }

    /// Finish a login the external provider has already verified.
    ///
    /// An existing account with the same email is reused whatever its
    /// provider; email is the only identity key.
    pub async fn complete_federated_login(
        &self,
        identity: FederatedIdentity,
    ) -> Result<Session, AuthError> {
        let email = normalize_email(&identity.email);
        if email.is_empty() {
            return Err(AuthError::Federation("provider returned no email".into()));
        }

        let user = match self.store.find_user_by_email(&email).await? {
            Some(existing) => existing,
            None => {
                let name = match identity.display_name.trim() {
                    "" => email.split('@').next().unwrap_or_default().to_string(),
                    name => name.to_string(),
                };
                let inserted = self
                    .store
                    .insert_user(NewUser {
                        email: email.clone(),
                        name,
                        password_hash: None,
                        provider: identity.provider.clone(),
                        provider_id: Some(identity.provider_id.clone()),
                    })
                    .await;
                match inserted {
                    Ok(created) => {
                        info!(user_id = %created.id, provider = %created.provider, "federated user created");
                        created
                    }
                    // A concurrent first login for the same email won the insert.
                    Err(AuthError::DuplicateIdentity) => self
                        .store
                        .find_user_by_email(&email)
                        .await?
                        .ok_or(AuthError::DuplicateIdentity)?,
                    Err(e) => return Err(e),
                }
            }
        };

        let tokens = self.tokens.issue_pair(&user.id, &user.email).await?;
        info!(user_id = %user.id, provider = %identity.provider, "federated login completed");
        Ok(Session {
            user: user.profile(),
            tokens,
        })
    }

    /// Profile of the authenticated user.
    pub async fn current_user(&self, user_id: &str) -> Result<UserProfile, AuthError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .map(|u| u.profile())
            .ok_or_else(|| AuthError::NotFound("user".into()))
    }
}
