//! Google sign-in (OAuth 2.0 authorization code flow with PKCE).
//!
//! This module owns the handshake only. It ends with a [`FederatedIdentity`]
//! that `SessionService::complete_federated_login` turns into a session.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;

use crate::auth::AuthError;
use crate::config::{ConfigError, secret_from_env};
use crate::models::auth::FederatedIdentity;

/// Provider name stored on users created through Google.
pub const GOOGLE_PROVIDER: &str = "google";

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const GOOGLE_SCOPES: &str = "openid email profile";

/// TTL for pending login state (10 minutes).
const STATE_TTL: Duration = Duration::from_secs(600);

// =============================================================================
// PKCE helpers
// =============================================================================

/// Generate a PKCE code verifier (43 chars, URL-safe).
pub fn generate_code_verifier() -> String {
    use base64::Engine;
    use rand::RngCore;

    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// S256 code challenge for a verifier.
pub fn compute_code_challenge(verifier: &str) -> String {
    use base64::Engine;

    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

/// Random `state` parameter (CSRF token).
pub fn generate_state() -> String {
    use base64::Engine;
    use rand::RngCore;

    let mut bytes = [0u8; 24];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

// =============================================================================
// Pending state store
// =============================================================================

/// Login started but not yet completed.
#[derive(Debug)]
pub struct PendingLogin {
    pub pkce_verifier: String,
    pub created_at: Instant,
}

/// In-memory pending logins keyed by `state`.
#[derive(Debug, Default)]
pub struct PendingLoginStore {
    states: DashMap<String, PendingLogin>,
}

impl PendingLoginStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, state: String, pending: PendingLogin) {
        self.states.insert(state, pending);
    }

    /// Remove and return a pending login. `None` if unknown or expired.
    pub fn take(&self, state: &str) -> Option<PendingLogin> {
        self.take_at(state, Instant::now())
    }

    fn take_at(&self, state: &str, now: Instant) -> Option<PendingLogin> {
        let (_, pending) = self.states.remove(state)?;
        if now.saturating_duration_since(pending.created_at) > STATE_TTL {
            return None;
        }
        Some(pending)
    }

    /// Evict expired entries.
    pub fn cleanup(&self) {
        self.cleanup_at(Instant::now());
    }

    fn cleanup_at(&self, now: Instant) {
        self.states
            .retain(|_, v| now.saturating_duration_since(v.created_at) <= STATE_TTL);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Spawn a periodic cleanup task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                store.cleanup();
            }
        })
    }
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Clone, Debug)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    /// Where Google sends the browser back to (our callback route).
    pub callback_url: Url,
    pub auth_url: Url,
    pub token_url: Url,
    pub userinfo_url: Url,
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

impl GoogleConfig {
    /// Config pointing at Google's production endpoints.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        callback_url: Url,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            callback_url,
            auth_url: parse_url("GOOGLE_AUTH_URL", GOOGLE_AUTH_URL)?,
            token_url: parse_url("GOOGLE_TOKEN_URL", GOOGLE_TOKEN_URL)?,
            userinfo_url: parse_url("GOOGLE_USERINFO_URL", GOOGLE_USERINFO_URL)?,
        })
    }

    /// Reads `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET` and
    /// `GOOGLE_CALLBACK_URL`. Federation is disabled (`None`) when the client
    /// id is unset.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(client_id) = std::env::var("GOOGLE_CLIENT_ID")
            .ok()
            .filter(|v| !v.trim().is_empty())
        else {
            return Ok(None);
        };
        let client_secret = secret_from_env("GOOGLE_CLIENT_SECRET")?;
        let callback = std::env::var("GOOGLE_CALLBACK_URL")
            .map_err(|_| ConfigError::Missing("GOOGLE_CALLBACK_URL"))?;
        let mut config = Self::new(
            client_id.trim(),
            String::new(),
            parse_url("GOOGLE_CALLBACK_URL", callback.trim())?,
        )?;
        config.client_secret = client_secret;
        Ok(Some(config))
    }
}

// =============================================================================
// Provider
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
}

pub struct GoogleIdentityProvider {
    config: GoogleConfig,
    http: reqwest::Client,
    pending: Arc<PendingLoginStore>,
}

impl GoogleIdentityProvider {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            pending: Arc::new(PendingLoginStore::new()),
        }
    }

    pub fn pending(&self) -> &Arc<PendingLoginStore> {
        &self.pending
    }

    /// Start a login: remember the PKCE verifier and return the URL to
    /// redirect the browser to.
    pub fn authorization_url(&self) -> Url {
        let state = generate_state();
        let verifier = generate_code_verifier();
        let challenge = compute_code_challenge(&verifier);

        let mut url = self.config.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.callback_url.as_str())
            .append_pair("response_type", "code")
            .append_pair("scope", GOOGLE_SCOPES)
            .append_pair("state", &state)
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "S256");

        self.pending.insert(
            state,
            PendingLogin {
                pkce_verifier: verifier,
                created_at: Instant::now(),
            },
        );
        url
    }

    /// Finish the handshake started by [`Self::authorization_url`].
    pub async fn complete(&self, code: &str, state: &str) -> Result<FederatedIdentity, AuthError> {
        let pending = self
            .pending
            .take(state)
            .ok_or_else(|| AuthError::Federation("unknown or expired state".into()))?;

        let tokens = self.exchange_code(code, &pending.pkce_verifier).await?;
        let info = self.fetch_user_info(&tokens.access_token).await?;

        let email = info
            .email
            .filter(|_| info.email_verified)
            .ok_or_else(|| AuthError::Federation("no verified email in profile".into()))?;
        debug!(provider = GOOGLE_PROVIDER, "federated identity verified");

        Ok(FederatedIdentity {
            email,
            display_name: info.name.unwrap_or_default(),
            provider: GOOGLE_PROVIDER.to_string(),
            provider_id: info.sub,
        })
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenResponse, AuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("redirect_uri", self.config.callback_url.as_str()),
            ("code_verifier", verifier),
        ];

        let resp = self
            .http
            .post(self.config.token_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Federation(format!("token exchange failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            warn!(%status, "token exchange rejected by provider");
            return Err(AuthError::Federation(format!(
                "token exchange HTTP {status}"
            )));
        }

        resp.json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::Federation(format!("token response parse error: {e}")))
    }

    async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfo, AuthError> {
        let resp = self
            .http
            .get(self.config.userinfo_url.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Federation(format!("userinfo request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            warn!(%status, "userinfo rejected by provider");
            return Err(AuthError::Federation(format!("userinfo HTTP {status}")));
        }

        resp.json::<UserInfo>()
            .await
            .map_err(|e| AuthError::Federation(format!("userinfo parse error: {e}")))
    }
}

// =============================================================================
// Tests
// =============================================================================
