//! API server configuration.

use warden_core::config::{ConfigError, RateLimitConfig, TokenConfig};
use warden_core::federated::GoogleConfig;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3000").
    pub bind_addr: String,
    /// Take the client address from `X-Forwarded-For` (behind a reverse proxy).
    pub trust_proxy: bool,
    pub tokens: TokenConfig,
    pub rate_limits: RateLimitConfig,
    /// `None` disables the federated routes.
    pub google: Option<GoogleConfig>,
}

impl ApiConfig {
    /// Defaults around the given token settings.
    pub fn new(tokens: TokenConfig) -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".into(),
            trust_proxy: false,
            tokens,
            rate_limits: RateLimitConfig::default(),
            google: None,
        }
    }

    /// Reads configuration from environment variables.
    ///
    /// | Variable       | Default          |
    /// |----------------|------------------|
    /// | `BIND_ADDR`    | `127.0.0.1:3000` |
    /// | `TRUST_PROXY`  | `false`          |
    ///
    /// plus everything read by `TokenConfig::from_env`,
    /// `RateLimitConfig::from_env` and `GoogleConfig::from_env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into()),
            trust_proxy: flag_from_env("TRUST_PROXY")?,
            tokens: TokenConfig::from_env()?,
            rate_limits: RateLimitConfig::from_env()?,
            google: GoogleConfig::from_env()?,
        })
    }
}

fn flag_from_env(name: &'static str) -> Result<bool, ConfigError> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}
