use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{
        GoogleLoginRequest, GoogleLoginResponse, LoginRequest, LoginResponse, MessageResponse,
        RefreshRequest, RefreshResponse, RegisterRequest, RegisterResponse,
    },
    google::GoogleAuthError,
    password::{hash_password_blocking, verify_password_blocking},
    services::{auth_cookie, clear_auth_cookie, is_valid_email, issue_session, normalize_email},
};
use crate::{
    error::{ApiError, ApiResult},
    extract::{check_text_len, ApiJson},
    state::AppState,
    users::repo_types::NewUser,
};

const MIN_PASSWORD_LEN: usize = 8;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/google-login", post(google_login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

fn session_cookie(state: &AppState, token: &str) -> String {
    auth_cookie(token, state.jwt.access_ttl.as_secs(), state.config.production)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let name = payload.name.trim().to_string();
    let email = normalize_email(&payload.email);

    if name.is_empty() {
        warn!("register without name");
        return Err(ApiError::bad_request("Name is required"));
    }
    check_text_len("Name", &name)?;
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::bad_request("Invalid email"));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::bad_request("Password too short"));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hash = hash_password_blocking(payload.password).await?;
    // a concurrent registration still trips the unique constraint → 409
    let user = state
        .users
        .create(NewUser {
            name,
            email,
            password_hash: Some(hash),
            profile_completed: false,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".into(),
            user_id: user.id,
        }),
    ))
}

#[instrument(skip(state, headers, peer, payload))]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let key = state.login_limiter.client_key(&headers, peer.as_ref());
    if let Err(retry) = state.login_limiter.check(&key).await {
        warn!(client = %key, "login rate limit exceeded");
        return Err(ApiError::TooManyRequests {
            retry_after_secs: retry.as_secs().max(1),
            message: format!(
                "Too many requests, please try again after {} minutes.",
                state.login_limiter.window_minutes()
            ),
        });
    }

    let email = normalize_email(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(ApiError::user_not_found());
    };

    let matches = match user.password_hash.clone() {
        Some(hash) => verify_password_blocking(payload.password, hash).await?,
        None => false, // google-only account
    };
    if !matches {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid email or password".into()));
    }

    let session = issue_session(&state.jwt, user.id)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((
        [(header::SET_COOKIE, session_cookie(&state, &session.access_token))],
        Json(LoginResponse {
            message: "Login successful".into(),
            token: session.access_token,
            refresh_token: session.refresh_token,
            user_id: user.id,
            wizard_completed: user.profile_completed,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn google_login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<GoogleLoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let Some(verifier) = state.google.clone() else {
        return Err(ApiError::ServiceUnavailable(
            "Google login is not configured".into(),
        ));
    };
    if payload.id_token.trim().is_empty() {
        return Err(ApiError::bad_request("idToken is required"));
    }
    if let Some(name) = payload.name.as_deref() {
        check_text_len("Name", name.trim())?;
    }

    let identity = verifier
        .verify(payload.id_token.trim())
        .await
        .map_err(|e| match e {
            GoogleAuthError::Rejected(reason) => {
                warn!(%reason, "google token rejected");
                ApiError::Unauthorized("Invalid Google credentials".into())
            }
            GoogleAuthError::Transport(e) => ApiError::Internal(e.into()),
        })?;

    let user = match state.users.find_by_email(&identity.email).await? {
        Some(user) => user,
        None => {
            let name = payload
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .or(identity.name)
                .unwrap_or_else(|| identity.email.clone());
            // google sign-ups skip the wizard
            let user = state
                .users
                .create(NewUser {
                    name,
                    email: identity.email,
                    password_hash: None,
                    profile_completed: true,
                })
                .await?;
            info!(user_id = %user.id, "user registered via google");
            user
        }
    };

    let session = issue_session(&state.jwt, user.id)?;
    info!(user_id = %user.id, "user logged in via google");
    Ok((
        [(header::SET_COOKIE, session_cookie(&state, &session.access_token))],
        Json(GoogleLoginResponse {
            message: "Login Successful".into(),
            token: session.access_token,
            refresh_token: session.refresh_token,
            user,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> ApiResult<impl IntoResponse> {
    let claims = state
        .jwt
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| {
            warn!(error = %e, "refresh token rejected");
            ApiError::Unauthorized("Invalid refresh token".into())
        })?;

    if state.users.find_by_id(claims.sub).await?.is_none() {
        return Err(ApiError::Unauthorized("User not found".into()));
    }

    let session = issue_session(&state.jwt, claims.sub)?;
    Ok((
        [(header::SET_COOKIE, session_cookie(&state, &session.access_token))],
        Json(RefreshResponse {
            token: session.access_token,
            refresh_token: session.refresh_token,
            user_id: claims.sub,
        }),
    ))
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, clear_auth_cookie(state.config.production))],
        Json(MessageResponse {
            message: "Logged out".into(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, sync::Arc};

    use async_trait::async_trait;
    use axum::extract::ConnectInfo;
    use axum::http::{header, Method, StatusCode};
    use serde_json::json;

    use crate::auth::google::{GoogleAuthError, GoogleIdentity, GoogleTokenVerifier};
    use crate::state::AppState;
    use crate::testing::{login, register, send, send_request, test_app, TestApp};

    fn login_attempt(forwarded_for: &str) -> axum::http::Request<axum::body::Body> {
        let mut request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", forwarded_for)
            .body(axum::body::Body::from(
                json!({"email": "ghost@example.com", "password": "password123"}).to_string(),
            ))
            .unwrap();
        let peer: SocketAddr = "198.51.100.4:40000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    }

    struct FakeGoogle;

    #[async_trait]
    impl GoogleTokenVerifier for FakeGoogle {
        async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, GoogleAuthError> {
            match id_token {
                "good-token" => Ok(GoogleIdentity {
                    email: "sundar@example.com".into(),
                    name: Some("Sundar".into()),
                }),
                _ => Err(GoogleAuthError::Rejected("bad token".into())),
            }
        }
    }

    #[tokio::test]
    async fn register_creates_user_with_default_credits() {
        let app = test_app();
        let user_id = register(&app, "ada@example.com").await;

        let user = app.state.users.find_by_id(user_id).await.unwrap().unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.credits, 300);
        assert!(!user.profile_completed);
        let hash = user.password_hash.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert_ne!(hash, "password123");
    }

    #[tokio::test]
    async fn register_rejects_bad_input_and_duplicates() {
        let app = test_app();
        let (status, _, _) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            Some(json!({"name": "X", "email": "nope", "password": "password123"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body, _) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            Some(json!({"name": "X", "email": "x@example.com", "password": "short"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Password too short");

        let (status, body, _) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            Some(json!({"name": "n".repeat(201), "email": "long@example.com", "password": "password123"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Name must be at most 200 characters");

        register(&app, "dup@example.com").await;
        let (status, _, _) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            Some(json!({"name": "Dup", "email": "DUP@example.com", "password": "password123"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn login_returns_token_and_cookie() {
        let app = test_app();
        let user_id = register(&app, "grace@example.com").await;

        let (status, body, headers) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            Some(json!({"email": "grace@example.com", "password": "password123"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["userId"], user_id.to_string());
        assert_eq!(body["WizardCompleted"], false);

        let token = body["token"].as_str().unwrap();
        assert_eq!(app.state.jwt.verify(token).unwrap().sub, user_id);

        let cookie = headers[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with(&format!("authToken={token};")));
        assert!(cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn login_failures() {
        let app = test_app();
        register(&app, "linus@example.com").await;

        let (status, _, _) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            Some(json!({"email": "linus@example.com", "password": "wrong-password"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body, _) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            Some(json!({"email": "ghost@example.com", "password": "password123"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");

        let (status, body, _) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            Some(json!({"email": "linus@example.com"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Email and password are required");
    }

    #[tokio::test]
    async fn login_is_rate_limited() {
        let app = test_app();
        for _ in 0..5 {
            let (status, _, _) = send(
                &app,
                Method::POST,
                "/api/auth/login",
                Some(json!({"email": "ghost@example.com", "password": "password123"})),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
        let (status, body, headers) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            Some(json!({"email": "ghost@example.com", "password": "password123"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body["message"],
            "Too many requests, please try again after 15 minutes."
        );
        assert!(headers.contains_key(header::RETRY_AFTER));
    }

    #[tokio::test]
    async fn rotating_forwarded_for_does_not_reset_limit() {
        let app = test_app();
        for i in 0..5 {
            let (status, _, _) = send_request(&app, login_attempt(&format!("10.9.9.{i}"))).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
        let (status, body, _) = send_request(&app, login_attempt("10.9.9.99")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn trusted_proxy_limits_per_forwarded_client() {
        let base = AppState::fake();
        let mut config = (*base.config).clone();
        config.login_rate_limit.trust_proxy = true;
        let app = TestApp::new(AppState::from_parts(
            Arc::new(config),
            base.users.clone(),
            None,
        ));

        for _ in 0..5 {
            let (status, _, _) = send_request(&app, login_attempt("203.0.113.1")).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
        let (status, _, _) = send_request(&app, login_attempt("203.0.113.1")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        // a different forwarded client behind the same proxy has its own window
        let (status, _, _) = send_request(&app, login_attempt("203.0.113.2")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn refresh_issues_new_pair_and_rejects_access_tokens() {
        let app = test_app();
        register(&app, "r@example.com").await;
        let (status, body, _) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            Some(json!({"email": "r@example.com", "password": "password123"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, refreshed, _) = send(
            &app,
            Method::POST,
            "/api/auth/refresh",
            Some(json!({"refreshToken": body["refreshToken"]})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(refreshed["userId"], body["userId"]);

        let (status, _, _) = send(
            &app,
            Method::POST,
            "/api/auth/refresh",
            Some(json!({"refreshToken": body["token"]})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_clears_cookie() {
        let app = test_app();
        let (status, _, headers) =
            send(&app, Method::POST, "/api/auth/logout", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn google_login_disabled_without_client_id() {
        let app = test_app();
        let (status, _, _) = send(
            &app,
            Method::POST,
            "/api/auth/google-login",
            Some(json!({"idToken": "good-token"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn google_login_creates_then_reuses_account() {
        let app = TestApp::new(AppState::fake().with_google(Arc::new(FakeGoogle)));

        let (status, first, _) = send(
            &app,
            Method::POST,
            "/api/auth/google-login",
            Some(json!({"idToken": "good-token"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["user"]["email"], "sundar@example.com");
        assert_eq!(first["user"]["name"], "Sundar");
        assert_eq!(first["user"]["profileCompleted"], true);
        assert!(first["user"].get("passwordHash").is_none());

        let (_, second, _) = send(
            &app,
            Method::POST,
            "/api/auth/google-login",
            Some(json!({"idToken": "good-token", "name": "Someone Else"})),
            None,
        )
        .await;
        assert_eq!(second["user"]["id"], first["user"]["id"]);

        // no password was set, so password login must fail
        let (status, _, _) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            Some(json!({"email": "sundar@example.com", "password": "anything-at-all"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, _) = send(
            &app,
            Method::POST,
            "/api/auth/google-login",
            Some(json!({"idToken": "forged"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_helper_token_is_accepted() {
        let app = test_app();
        let (user_id, token) = login(&app, "helper@example.com").await;
        assert_eq!(app.state.jwt.verify(&token).unwrap().sub, user_id);
    }
}
