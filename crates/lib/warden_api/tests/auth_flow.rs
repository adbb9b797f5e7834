//! Integration tests: build the router over the in-memory store and drive it
//! with `oneshot`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::Form;
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;
use warden_api::config::ApiConfig;
use warden_api::{AppState, router};
use warden_core::auth::memory::MemoryCredentialStore;
use warden_core::config::TokenConfig;
use warden_core::federated::GoogleConfig;

fn config() -> ApiConfig {
    let mut config = ApiConfig::new(TokenConfig::new("access-secret", "refresh-secret"));
    config.trust_proxy = true;
    config
}

fn app_with(config: ApiConfig) -> Router {
    let store = Arc::new(MemoryCredentialStore::new());
    router(AppState::new(store, config).expect("app state"))
}

fn app() -> Router {
    app_with(config())
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(req).await.expect("request")
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let resp = send(app, "POST", uri, Some(body), &[]).await;
    let status = resp.status();
    (status, json_body(resp).await)
}

async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("parse JSON")
}

async fn register_alice(app: &Router) -> Value {
    let (status, body) = post_json(
        app,
        "/api/auth/register",
        json!({"email": "a@x.com", "password": "secret1", "name": "Alice"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

async fn login_alice(app: &Router) -> Value {
    let (status, body) = post_json(
        app,
        "/api/auth/login",
        json!({"email": "a@x.com", "password": "secret1"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

#[tokio::test]
async fn full_session_lifecycle() {
    let app = app();

    let registered = register_alice(&app).await;
    assert_eq!(registered["user"]["email"], "a@x.com");
    assert_eq!(registered["user"]["name"], "Alice");
    assert!(registered["user"].get("passwordHash").is_none());
    assert!(registered.get("accessToken").is_none());

    let (status, body) = post_json(
        &app,
        "/api/auth/login",
        json!({"email": "a@x.com", "password": "wrong"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let login = login_alice(&app).await;
    assert_eq!(login["tokenType"], "Bearer");
    assert_eq!(login["expiresIn"], 900);
    let first_refresh = login["refreshToken"].as_str().unwrap().to_string();

    let (status, rotated) = post_json(
        &app,
        "/api/auth/refresh",
        json!({"refreshToken": first_refresh}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{rotated}");
    let second_refresh = rotated["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(second_refresh, first_refresh);

    let (status, _) = post_json(
        &app,
        "/api/auth/refresh",
        json!({"refreshToken": first_refresh}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = post_json(
        &app,
        "/api/auth/logout",
        json!({"refreshToken": second_refresh}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = post_json(
        &app,
        "/api/auth/refresh",
        json!({"refreshToken": second_refresh}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_json(
        &app,
        "/api/auth/logout",
        json!({"refreshToken": second_refresh}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = app();
    register_alice(&app).await;

    let (status, body) = post_json(
        &app,
        "/api/auth/register",
        json!({"email": "A@X.com", "password": "another1", "name": "Alicia"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn malformed_bodies_are_rejected() {
    let app = app();

    let (status, body) = post_json(
        &app,
        "/api/auth/register",
        json!({"email": "nope", "password": "123", "name": "A"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = post_json(&app, "/api/auth/login", json!({"email": "a@x.com"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let resp = send(&app, "POST", "/api/auth/refresh", None, &[]).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn me_and_logout_all_require_bearer() {
    let app = app();
    register_alice(&app).await;
    let first = login_alice(&app).await;
    let second = login_alice(&app).await;

    let resp = send(&app, "GET", "/api/auth/me", None, &[]).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = send(
        &app,
        "GET",
        "/api/auth/me",
        None,
        &[("authorization", "Bearer not-a-token")],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // A refresh token is not an access token.
    let wrong_kind = format!("Bearer {}", first["refreshToken"].as_str().unwrap());
    let resp = send(
        &app,
        "GET",
        "/api/auth/me",
        None,
        &[("authorization", wrong_kind.as_str())],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let bearer = format!("Bearer {}", first["accessToken"].as_str().unwrap());
    let resp = send(
        &app,
        "GET",
        "/api/auth/me",
        None,
        &[("authorization", bearer.as_str())],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let me = json_body(resp).await;
    assert_eq!(me["user"]["email"], "a@x.com");
    assert_eq!(me["user"]["provider"], "local");

    let resp = send(
        &app,
        "POST",
        "/api/auth/logout-all",
        None,
        &[("authorization", bearer.as_str())],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["revoked"], 2);

    for session in [&first, &second] {
        let (status, _) = post_json(
            &app,
            "/api/auth/refresh",
            json!({"refreshToken": session["refreshToken"]}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn sixth_login_from_one_client_is_rate_limited() {
    let app = app();
    let client = [("x-forwarded-for", "198.51.100.4")];
    let body = json!({"email": "ghost@x.com", "password": "whatever"});

    for attempt in 1..=5 {
        let resp = send(&app, "POST", "/api/auth/login", Some(body.clone()), &client).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "attempt {attempt}");
        assert_eq!(
            resp.headers()["ratelimit-remaining"],
            (5 - attempt).to_string().as_str()
        );
    }

    let resp = send(&app, "POST", "/api/auth/login", Some(body.clone()), &client).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = resp.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    assert_eq!(json_body(resp).await["error"], "rate_limited");

    // Another client is unaffected.
    let resp = send(
        &app,
        "POST",
        "/api/auth/login",
        Some(body),
        &[("x-forwarded-for", "198.51.100.5")],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn fourth_registration_from_one_client_is_rate_limited() {
    let app = app();
    let client = [("x-forwarded-for", "198.51.100.8")];

    for n in 1..=3 {
        let body = json!({"email": format!("user{n}@x.com"), "password": "secret1", "name": "User"});
        let resp = send(&app, "POST", "/api/auth/register", Some(body), &client).await;
        assert_eq!(resp.status(), StatusCode::CREATED, "registration {n}");
    }

    let body = json!({"email": "user4@x.com", "password": "secret1", "name": "User"});
    let resp = send(&app, "POST", "/api/auth/register", Some(body), &client).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(resp.headers().contains_key(header::RETRY_AFTER));
}

#[tokio::test]
async fn eleventh_refresh_from_one_client_is_rate_limited() {
    let app = app();
    let client = [("x-forwarded-for", "198.51.100.9")];
    let body = json!({"refreshToken": "not-a-token"});

    for attempt in 1..=10 {
        let resp = send(&app, "POST", "/api/auth/refresh", Some(body.clone()), &client).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "attempt {attempt}");
    }

    let resp = send(&app, "POST", "/api/auth/refresh", Some(body), &client).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers()["ratelimit-limit"], "10");
}

#[tokio::test]
async fn forwarded_for_is_ignored_unless_trusted() {
    let mut config = config();
    config.trust_proxy = false;
    let app = app_with(config);
    let client = [("x-forwarded-for", "198.51.100.4")];
    let body = json!({"email": "ghost@x.com", "password": "whatever"});

    // No peer address under oneshot and the header is untrusted: fail open.
    for _ in 0..7 {
        let resp = send(&app, "POST", "/api/auth/login", Some(body.clone()), &client).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn health_reports_version() {
    let resp = send(&app(), "GET", "/health", None, &[]).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], warden_core::version());
}

#[tokio::test]
async fn federated_routes_404_when_not_configured() {
    let resp = send(&app(), "GET", "/api/auth/federated/start", None, &[]).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Federated flow against a mock provider
// ---------------------------------------------------------------------------

async fn mock_token(Form(form): Form<HashMap<String, String>>) -> Result<Json<Value>, StatusCode> {
    if form.get("code").map(String::as_str) != Some("good-code") {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(Json(json!({"access_token": "provider-access", "token_type": "Bearer"})))
}

async fn mock_userinfo(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some("Bearer provider-access") => Ok(Json(json!({
            "sub": "google-7",
            "email": "Fed@X.com",
            "email_verified": true,
            "name": ""
        }))),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

async fn spawn_mock_provider() -> String {
    let provider = Router::new()
        .route("/token", post(mock_token))
        .route("/userinfo", get(mock_userinfo));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, provider).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn federated_login_round_trip() {
    let base = spawn_mock_provider().await;
    let mut google = GoogleConfig::new(
        "client-1",
        "client-secret",
        Url::parse("http://localhost:3000/api/auth/federated/callback").unwrap(),
    )
    .unwrap();
    google.token_url = Url::parse(&format!("{base}/token")).unwrap();
    google.userinfo_url = Url::parse(&format!("{base}/userinfo")).unwrap();

    let mut config = config();
    config.google = Some(google);
    let app = app_with(config);

    let resp = send(&app, "GET", "/api/auth/federated/start", None, &[]).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let location = Url::parse(resp.headers()[header::LOCATION].to_str().unwrap()).unwrap();
    let state = location
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    let callback = format!("/api/auth/federated/callback?code=good-code&state={state}");
    let resp = send(&app, "GET", &callback, None, &[]).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["user"]["email"], "fed@x.com");
    assert_eq!(body["user"]["name"], "fed");
    assert_eq!(body["user"]["provider"], "google");
    assert!(body["accessToken"].is_string());

    // The state is single-use.
    let resp = send(&app, "GET", &callback, None, &[]).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = send(&app, "GET", "/api/auth/federated/callback", None, &[]).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
