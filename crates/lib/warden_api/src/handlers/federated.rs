//! Google sign-in handlers.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Redirect;
use tracing::debug;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{FederatedCallbackParams, LoginResponse};

fn not_configured() -> AppError {
    AppError::NotFound("Federated login is not configured".into())
}

/// `GET /api/auth/federated/start`: 303 to the provider's consent page.
pub async fn start_handler(State(state): State<AppState>) -> AppResult<Redirect> {
    let provider = state.federated.as_ref().ok_or_else(not_configured)?;
    let url = provider.authorization_url();
    Ok(Redirect::to(url.as_str()))
}

/// `GET /api/auth/federated/callback`: finish the handshake and log in.
pub async fn callback_handler(
    State(state): State<AppState>,
    params: Result<Query<FederatedCallbackParams>, QueryRejection>,
) -> AppResult<Json<LoginResponse>> {
    let provider = state.federated.as_ref().ok_or_else(not_configured)?;
    let Query(params) = params?;

    if let Some(error) = params.error {
        debug!(%error, "provider returned an error to the callback");
        return Err(AppError::Unauthorized("Federated login was declined".into()));
    }
    let (Some(code), Some(pending_state)) = (params.code, params.state) else {
        return Err(AppError::Validation("code and state are required".into()));
    };

    let identity = provider.complete(&code, &pending_state).await?;
    let session = state.session.complete_federated_login(identity).await?;
    Ok(Json(session.into()))
}
