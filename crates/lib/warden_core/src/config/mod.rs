//! Token and rate-limit configuration.
//!
//! Signing secrets are mandatory: a process without them cannot serve
//! authentication, so `TokenConfig::from_env` fails instead of falling back.

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Default access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Default refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const ONE_MINUTE: Duration = Duration::from_secs(60);

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Signing secrets and lifetimes for issued tokens.
#[derive(Clone, Debug)]
pub struct TokenConfig {
    pub access_secret: SecretString,
    pub access_ttl: Duration,
    pub refresh_secret: SecretString,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    /// Config with the default lifetimes.
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: SecretString::from(access_secret.into()),
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_secret: SecretString::from(refresh_secret.into()),
            refresh_ttl: DEFAULT_REFRESH_TTL,
        }
    }

    /// Reads token settings from the environment.
    ///
    /// | Variable             | Default  |
    /// |----------------------|----------|
    /// | `JWT_ACCESS_SECRET`  | required |
    /// | `JWT_ACCESS_EXPIRY`  | `15m`    |
    /// | `JWT_REFRESH_SECRET` | required |
    /// | `JWT_REFRESH_EXPIRY` | `7d`     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            access_secret: secret_from_env("JWT_ACCESS_SECRET")?,
            access_ttl: duration_from_env("JWT_ACCESS_EXPIRY", DEFAULT_ACCESS_TTL)?,
            refresh_secret: secret_from_env("JWT_REFRESH_SECRET")?,
            refresh_ttl: duration_from_env("JWT_REFRESH_EXPIRY", DEFAULT_REFRESH_TTL)?,
        })
    }
}

/// Ceiling for one guarded action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowLimit {
    pub max_requests: u32,
    pub window: Duration,
}

impl WindowLimit {
    pub const fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: ONE_MINUTE,
        }
    }
}

/// Per-action rate limits (register 3/min, login 5/min, refresh 10/min).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub register: WindowLimit,
    pub login: WindowLimit,
    pub refresh: WindowLimit,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            register: WindowLimit::per_minute(3),
            login: WindowLimit::per_minute(5),
            refresh: WindowLimit::per_minute(10),
        }
    }
}

impl RateLimitConfig {
    /// Defaults, overridden by `RATE_LIMIT_{REGISTER,LOGIN,REFRESH}_{MAX,WINDOW}`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            register: limit_from_env(
                "RATE_LIMIT_REGISTER_MAX",
                "RATE_LIMIT_REGISTER_WINDOW",
                defaults.register,
            )?,
            login: limit_from_env(
                "RATE_LIMIT_LOGIN_MAX",
                "RATE_LIMIT_LOGIN_WINDOW",
                defaults.login,
            )?,
            refresh: limit_from_env(
                "RATE_LIMIT_REFRESH_MAX",
                "RATE_LIMIT_REFRESH_WINDOW",
                defaults.refresh,
            )?,
        })
    }
}

/// Parse `900`, `90s`, `15m`, `12h` or `7d`.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: u64 = digits.parse().ok()?;
    let secs = match unit.trim() {
        "" | "s" => amount,
        "m" => amount.checked_mul(60)?,
        "h" => amount.checked_mul(60 * 60)?,
        "d" => amount.checked_mul(24 * 60 * 60)?,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read a mandatory secret.
pub fn secret_from_env(name: &'static str) -> Result<SecretString, ConfigError> {
    env_value(name)
        .map(SecretString::from)
        .ok_or(ConfigError::Missing(name))
}

fn duration_from_env(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let Some(raw) = env_value(name) else {
        return Ok(default);
    };
    match parse_duration(&raw) {
        Some(d) if !d.is_zero() => Ok(d),
        _ => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a duration like 15m or 7d, got {raw:?}"),
        }),
    }
}

fn limit_from_env(
    max_name: &'static str,
    window_name: &'static str,
    default: WindowLimit,
) -> Result<WindowLimit, ConfigError> {
    let max_requests = match env_value(max_name) {
        None => default.max_requests,
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            name: max_name,
            reason: format!("expected a request count, got {raw:?}"),
        })?,
    };
    Ok(WindowLimit {
        max_requests,
        window: duration_from_env(window_name, default.window)?,
    })
}
