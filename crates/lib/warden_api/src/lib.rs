//! # warden_api
//!
//! HTTP API library for Warden.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use warden_core::auth::AuthError;
use warden_core::auth::session::SessionService;
use warden_core::auth::store::CredentialStore;
use warden_core::auth::tokens::TokenAuthority;
use warden_core::federated::GoogleIdentityProvider;
use warden_core::rate_limit::AbuseGuard;

use crate::config::ApiConfig;
use crate::handlers::{auth, federated, health};
use crate::middleware::rate_limit;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionService>,
    pub guard: Arc<AbuseGuard>,
    /// Present when Google sign-in is configured.
    pub federated: Option<Arc<GoogleIdentityProvider>>,
    pub config: ApiConfig,
}

impl AppState {
    /// Wire the services over `store`. Fails on unusable token settings.
    pub fn new(store: Arc<dyn CredentialStore>, config: ApiConfig) -> Result<Self, AuthError> {
        let tokens = Arc::new(TokenAuthority::new(store.clone(), &config.tokens)?);
        let session = Arc::new(SessionService::new(store, tokens));
        let guard = Arc::new(AbuseGuard::new(&config.rate_limits));
        let federated = config
            .google
            .clone()
            .map(|google| Arc::new(GoogleIdentityProvider::new(google)));
        Ok(Self {
            session,
            guard,
            federated,
            config,
        })
    }
}

/// Run embedded database migrations.
///
/// Delegates to `warden_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    warden_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes, the credential-bearing ones behind the abuse guard
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(
            routes::POST_AUTH_REGISTER,
            post(auth::register_handler)
                .layer(from_fn_with_state(state.clone(), rate_limit::limit_register)),
        )
        .route(
            routes::POST_AUTH_LOGIN,
            post(auth::login_handler)
                .layer(from_fn_with_state(state.clone(), rate_limit::limit_login)),
        )
        .route(
            routes::POST_AUTH_REFRESH,
            post(auth::refresh_handler)
                .layer(from_fn_with_state(state.clone(), rate_limit::limit_refresh)),
        )
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(
            routes::GET_AUTH_FEDERATED_START,
            get(federated::start_handler),
        )
        .route(
            routes::GET_AUTH_FEDERATED_CALLBACK,
            get(federated::callback_handler),
        );

    // Protected routes (require a bearer access token)
    let protected = Router::new()
        .route(routes::POST_AUTH_LOGOUT_ALL, post(auth::logout_all_handler))
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
