//! Authentication request handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    LoginRequest, LoginResponse, LogoutAllResponse, LogoutResponse, MeResponse, RefreshRequest,
    RegisterRequest, RegisterResponse, TokenResponse,
};

/// `POST /api/auth/register`: create a local account. No tokens are issued.
pub async fn register_handler(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let Json(body) = body?;
    body.validate()?;
    let profile = state
        .session
        .register(&body.email, &body.password, &body.name)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".into(),
            user: profile.into(),
        }),
    ))
}

/// `POST /api/auth/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let Json(body) = body?;
    body.validate()?;
    let session = state.session.login(&body.email, &body.password).await?;
    Ok(Json(session.into()))
}

/// `POST /api/auth/refresh`: exchange a refresh token for a new pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> AppResult<Json<TokenResponse>> {
    let Json(body) = body?;
    body.validate()?;
    let pair = state.session.refresh(body.refresh_token.trim()).await?;
    Ok(Json(pair.into()))
}

/// `POST /api/auth/logout`: revoke one refresh token.
pub async fn logout_handler(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> AppResult<Json<LogoutResponse>> {
    let Json(body) = body?;
    body.validate()?;
    state.session.logout(body.refresh_token.trim()).await?;
    Ok(Json(LogoutResponse {
        success: true,
        message: "Logged out successfully".into(),
    }))
}

/// `POST /api/auth/logout-all`: revoke every refresh token of the caller.
pub async fn logout_all_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
) -> AppResult<Json<LogoutAllResponse>> {
    let revoked = state.session.logout_all(&claims.sub).await?;
    Ok(Json(LogoutAllResponse {
        success: true,
        revoked,
    }))
}

/// `GET /api/auth/me`: profile of the bearer.
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
) -> AppResult<Json<MeResponse>> {
    let profile = state.session.current_user(&claims.sub).await?;
    Ok(Json(MeResponse {
        user: profile.into(),
    }))
}
