//! Abuse guard middleware for the register, login and refresh routes.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use warden_core::auth::AuthError;
use warden_core::rate_limit::{GuardedAction, RateLimitDecision};

use crate::AppState;
use crate::error::AppError;

const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Address the request originates from.
///
/// With `trust_proxy` the first `X-Forwarded-For` entry wins; otherwise the
/// TCP peer. `None` when neither is available.
pub fn client_identity(request: &Request, trust_proxy: bool) -> Option<String> {
    if trust_proxy
        && let Some(forwarded) = request
            .headers()
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    {
        return Some(forwarded.to_string());
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// Whole seconds, rounded up.
fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

fn set_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset: Duration) {
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(remaining));
    headers.insert(RATELIMIT_RESET, HeaderValue::from(ceil_secs(reset)));
}

async fn enforce(state: AppState, action: GuardedAction, request: Request, next: Next) -> Response {
    let client = client_identity(&request, state.config.trust_proxy);
    match state.guard.check(action, client.as_deref()) {
        RateLimitDecision::Allowed {
            limit,
            remaining,
            reset_after,
        } => {
            let mut response = next.run(request).await;
            set_headers(response.headers_mut(), limit, remaining, reset_after);
            response
        }
        RateLimitDecision::Limited { limit, retry_after } => {
            let retry_after_secs = ceil_secs(retry_after).max(1);
            let mut response =
                AppError::from(AuthError::RateLimited { retry_after_secs }).into_response();
            set_headers(response.headers_mut(), limit, 0, retry_after);
            response
        }
    }
}

pub async fn limit_register(State(state): State<AppState>, request: Request, next: Next) -> Response {
    enforce(state, GuardedAction::Register, request, next).await
}

pub async fn limit_login(State(state): State<AppState>, request: Request, next: Next) -> Response {
    enforce(state, GuardedAction::Login, request, next).await
}

pub async fn limit_refresh(State(state): State<AppState>, request: Request, next: Next) -> Response {
    enforce(state, GuardedAction::Refresh, request, next).await
}
