pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repo;
pub mod services;
pub mod utils;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
};
use service_core::error::AppError;
use service_core::middleware::rate_limit::{IpRateLimiter, ip_rate_limit_middleware};
use service_core::middleware::security_headers::security_headers_middleware;
use service_core::middleware::tracing::request_id_middleware;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::IdentityConfig;
use crate::services::{AuthService, TeamService};

#[derive(Clone)]
pub struct AppState {
    pub config: IdentityConfig,
    pub auth: AuthService,
    pub teams: TeamService,
    pub login_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
    pub password_reset_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Rate-limited public auth routes
    let login_limiter = state.login_rate_limiter.clone();
    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(login_limiter, ip_rate_limit_middleware));

    let register_limiter = state.register_rate_limiter.clone();
    let register_route = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            register_limiter,
            ip_rate_limit_middleware,
        ));

    let reset_limiter = state.password_reset_rate_limiter.clone();
    let reset_route = Router::new()
        .route("/auth/forgot-password", post(handlers::auth::forgot_password))
        .layer(from_fn_with_state(reset_limiter, ip_rate_limit_middleware));

    // Bearer-authenticated routes
    let protected_routes = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/change-password", post(handlers::auth::change_password))
        .route("/teams", post(handlers::team::create_team))
        .route("/teams", get(handlers::team::list_teams))
        .route("/teams/:team_id", get(handlers::team::get_team))
        .route("/teams/:team_id", put(handlers::team::update_team))
        .route("/teams/:team_id", delete(handlers::team::delete_team))
        .route("/teams/:team_id/members", get(handlers::team::list_members))
        .route("/teams/:team_id/invite", post(handlers::team::invite_user))
        .route("/teams/:team_id/accept", post(handlers::team::accept_invitation))
        .route(
            "/teams/:team_id/members/:member_id/role",
            put(handlers::team::update_member_role),
        )
        .route(
            "/teams/:team_id/members/:member_id",
            delete(handlers::team::remove_member),
        )
        .route("/teams/:team_id/leave", post(handlers::team::leave_team))
        .route(
            "/teams/:team_id/transfer-ownership",
            post(handlers::team::transfer_ownership),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let ip_limiter = state.ip_rate_limiter.clone();

    let cors = build_cors(&state.config)?;

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/verify-email", get(handlers::auth::verify_email))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/reset-password", post(handlers::auth::reset_password))
        .merge(login_route)
        .merge(register_route)
        .merge(reset_route)
        .merge(protected_routes)
        .with_state(state)
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors);

    Ok(app)
}

fn build_cors(config: &IdentityConfig) -> Result<CorsLayer, AppError> {
    let origins = config
        .security
        .allowed_origins
        .iter()
        .map(|origin| {
            origin.parse::<HeaderValue>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid CORS origin {}: {}", origin, e))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
}
