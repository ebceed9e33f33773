//! Helpers for driving the router in tests.

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use crate::{app::build_app, state::AppState};

pub const TEST_PASSWORD: &str = "password123";

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new(state: AppState) -> Self {
        Self {
            router: build_app(state.clone()),
            state,
        }
    }
}

pub fn test_app() -> TestApp {
    TestApp::new(AppState::fake())
}

pub async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value, HeaderMap) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    send_request(app, request).await
}

/// Sends a prebuilt request; non-JSON bodies come back as `Value::String`.
pub async fn send_request(
    app: &TestApp,
    request: Request<Body>,
) -> (StatusCode, Value, HeaderMap) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body, headers)
}

/// Registers `email` with [`TEST_PASSWORD`] and returns the new id.
pub async fn register(app: &TestApp, email: &str) -> Uuid {
    let (status, body, _) = send(
        app,
        Method::POST,
        "/api/auth/register",
        Some(json!({"name": "Test User", "email": email, "password": TEST_PASSWORD})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body["userId"].as_str().unwrap().parse().unwrap()
}

/// Registers and logs in; returns the id and an access token.
pub async fn login(app: &TestApp, email: &str) -> (Uuid, String) {
    let user_id = register(app, email).await;
    let (status, body, _) = send(
        app,
        Method::POST,
        "/api/auth/login",
        Some(json!({"email": email, "password": TEST_PASSWORD})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    (user_id, body["token"].as_str().unwrap().to_string())
}
