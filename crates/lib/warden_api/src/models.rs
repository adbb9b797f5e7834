//! HTTP request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_core::auth::password::MAX_PASSWORD_BYTES;
use warden_core::models::auth::{Session, TokenPair, UserProfile};

use crate::error::AppError;

const MIN_PASSWORD_LEN: usize = 6;
const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 255;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut problems = Vec::new();
        if !is_plausible_email(&self.email) {
            problems.push("email must be a valid email address".to_string());
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN
            || self.password.len() > MAX_PASSWORD_BYTES
        {
            problems.push(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters and at most {MAX_PASSWORD_BYTES} bytes"
            ));
        }
        let name_len = self.name.trim().chars().count();
        if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&name_len) {
            problems.push(format!(
                "name must be between {MIN_NAME_LEN} and {MAX_NAME_LEN} characters"
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(problems.join("; ")))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(AppError::Validation(
                "email and password are required".into(),
            ));
        }
        Ok(())
    }
}

/// Body of `/refresh` and `/logout`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl RefreshRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.refresh_token.trim().is_empty() {
            return Err(AppError::Validation("refreshToken is required".into()));
        }
        Ok(())
    }
}

/// Query string Google appends to the callback redirect.
#[derive(Debug, Clone, Deserialize)]
pub struct FederatedCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set instead of `code` when the user declined consent.
    pub error: Option<String>,
}

fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    if email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub provider: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserProfile> for UserResponse {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            name: profile.name,
            provider: profile.provider,
            created_at: profile.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: pair.token_type.to_string(),
            expires_in: pair.expires_in,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserResponse,
    #[serde(flatten)]
    pub tokens: TokenResponse,
}

impl From<Session> for LoginResponse {
    fn from(session: Session) -> Self {
        Self {
            user: session.user.into(),
            tokens: session.tokens.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutAllResponse {
    pub success: bool,
    /// Number of refresh tokens revoked.
    pub revoked: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(email: &str, password: &str, name: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: password.into(),
            name: name.into(),
        }
    }

    #[test]
    fn valid_registration_passes() {
        assert!(register("a@x.com", "secret1", "Alice").validate().is_ok());
    }

    #[test]
    fn password_limit_is_bcrypt_input_size() {
        assert!(register("a@x.com", &"x".repeat(72), "Alice").validate().is_ok());
        assert!(register("a@x.com", &"x".repeat(73), "Alice").validate().is_err());
        // 25 three-byte characters are 75 bytes.
        assert!(register("a@x.com", &"€".repeat(25), "Alice").validate().is_err());
    }

    #[test]
    fn registration_reports_every_problem() {
        let err = register("not-an-email", "123", "A").validate().unwrap_err();
        let AppError::Validation(message) = err else {
            panic!("expected validation error");
        };
        assert!(message.contains("email"));
        assert!(message.contains("password"));
        assert!(message.contains("name"));
    }

    #[test]
    fn email_shapes() {
        assert!(is_plausible_email("user@example.org"));
        assert!(!is_plausible_email("user@localhost"));
        assert!(!is_plausible_email("@example.org"));
        assert!(!is_plausible_email("a b@example.org"));
        assert!(!is_plausible_email("a@b@example.org"));
    }

    #[test]
    fn login_response_is_flat_camel_case() {
        let body = LoginResponse {
            user: UserResponse {
                id: "u1".into(),
                email: "a@x.com".into(),
                name: "Alice".into(),
                provider: "local".into(),
                created_at: Utc::now(),
            },
            tokens: TokenResponse {
                access_token: "a".into(),
                refresh_token: "r".into(),
                token_type: "Bearer".into(),
                expires_in: 900,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");
        assert_eq!(json["tokenType"], "Bearer");
        assert_eq!(json["expiresIn"], 900);
        assert!(json["user"]["createdAt"].is_string());
    }

    #[test]
    fn refresh_request_reads_camel_case() {
        let req: RefreshRequest = serde_json::from_str(r#"{"refreshToken":"t"}"#).unwrap();
        assert_eq!(req.refresh_token, "t");
        assert!(RefreshRequest {
            refresh_token: " ".into()
        }
        .validate()
        .is_err());
    }
}
