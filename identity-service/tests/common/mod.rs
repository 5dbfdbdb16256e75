//! Shared harness for router-level integration tests. Everything runs
//! against the in-memory store and mock collaborators; no Postgres,
//! Redis, or SMTP required.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

use identity_service::{
    AppState, build_router,
    config::{
        DatabaseConfig, Environment, IdentityConfig, JwtConfig, RateLimitConfig, RedisConfig,
        SecurityConfig, SmtpConfig,
    },
    repo::InMemoryStore,
    services::{
        AuthService, EmailKind, InMemoryCache, MockAudit, MockEmailService, SecurityPolicy,
        TeamService, TokenService,
    },
};
use service_core::middleware::rate_limit::create_ip_rate_limiter;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Low-memory argon2 so the suite stays fast.
pub const TEST_HASH_COST_KIB: u32 = 8;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub email: Arc<MockEmailService>,
    pub audit: Arc<MockAudit>,
    pub auth: AuthService,
}

pub fn test_config() -> IdentityConfig {
    IdentityConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "identity-service".to_string(),
        service_version: "0.0.0-test".to_string(),
        log_level: "error".to_string(),
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        redis: RedisConfig {
            url: "redis://unused".to_string(),
        },
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            algorithm: "HS256".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            lockout_threshold: 5,
            lockout_duration_minutes: 15,
            password_reset_ttl_minutes: 60,
            password_hash_cost: TEST_HASH_COST_KIB,
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from_address: "no-reply@localhost".to_string(),
            public_base_url: "http://localhost:3000".to_string(),
        },
        rate_limit: RateLimitConfig {
            login_attempts: 1000,
            login_window_seconds: 60,
            register_attempts: 1000,
            register_window_seconds: 60,
            password_reset_attempts: 1000,
            password_reset_window_seconds: 60,
            global_ip_limit: 10_000,
            global_ip_window_seconds: 60,
        },
    }
}

pub async fn spawn_app() -> TestApp {
    let config = test_config();

    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(InMemoryCache::new());
    let email = Arc::new(MockEmailService::new());
    let audit = Arc::new(MockAudit::new());

    let tokens = TokenService::new(
        &config.jwt.secret,
        &config.jwt.algorithm,
        config.jwt.access_token_expiry_minutes,
        config.jwt.refresh_token_expiry_days,
    )
    .expect("Failed to create token service");

    let policy = SecurityPolicy {
        lockout_threshold: config.security.lockout_threshold,
        lockout_duration_minutes: config.security.lockout_duration_minutes,
        password_reset_ttl_minutes: config.security.password_reset_ttl_minutes,
        password_hash_cost_kib: config.security.password_hash_cost,
    };

    let auth = AuthService::new(
        store.clone(),
        tokens,
        cache,
        email.clone(),
        audit.clone(),
        policy,
    );
    let teams = TeamService::new(store.clone(), store.clone(), audit.clone());

    let state = AppState {
        config,
        auth: auth.clone(),
        teams,
        login_rate_limiter: create_ip_rate_limiter(1000, 60),
        register_rate_limiter: create_ip_rate_limiter(1000, 60),
        password_reset_rate_limiter: create_ip_rate_limiter(1000, 60),
        ip_rate_limiter: create_ip_rate_limiter(10_000, 60),
    };

    let router = build_router(state).await.expect("Failed to build router");

    TestApp {
        router,
        store,
        email,
        audit,
        auth,
    }
}

/// Send one request through the router and decode the JSON response.
pub async fn request(
    app: &TestApp,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let request = if let Some(body) = body {
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("Failed to build request")
    } else {
        builder.body(Body::empty()).expect("Failed to build request")
    };

    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("Request failed");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

pub async fn post(
    app: &TestApp,
    path: &str,
    token: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    request(app, Method::POST, path, token, Some(body)).await
}

pub async fn get(app: &TestApp, path: &str, token: Option<&str>) -> (StatusCode, Value) {
    request(app, Method::GET, path, token, None).await
}

/// Register a user and complete email verification via the captured
/// token. Returns the user id.
pub async fn register_active_user(
    app: &TestApp,
    username: &str,
    email: &str,
    password: &str,
) -> Uuid {
    let (status, body) = post(
        app,
        "/auth/register",
        None,
        serde_json::json!({
            "username": username,
            "email": email,
            "password": password,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

    let user_id = body["user"]["user_id"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .expect("register response missing user_id");

    let token = app
        .email
        .last_token_for(email, EmailKind::Verification)
        .expect("No verification email captured");

    let (status, body) = get(app, &format!("/auth/verify-email?token={}", token), None).await;
    assert_eq!(status, StatusCode::OK, "verify failed: {}", body);

    user_id
}

/// Log in and return (access_token, refresh_token).
pub async fn login(app: &TestApp, username: &str, password: &str) -> (String, String) {
    let (status, body) = post(
        app,
        "/auth/login",
        None,
        serde_json::json!({ "username": username, "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);

    (
        body["token"].as_str().expect("missing token").to_string(),
        body["refreshToken"]
            .as_str()
            .expect("missing refreshToken")
            .to_string(),
    )
}
