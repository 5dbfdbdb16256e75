use identity_service::{
    AppState, build_router,
    config::IdentityConfig,
    repo::PgStore,
    services::{
        AuthService, RedisCache, SecurityPolicy, SmtpEmailService, TeamService, TokenService,
        TracingAudit,
    },
};
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = IdentityConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting identity service"
    );

    let pool = identity_service::db::create_pool(&config.database)
        .await
        .map_err(|e| service_core::error::AppError::DatabaseError(anyhow::anyhow!(e)))?;
    identity_service::db::run_migrations(&pool)
        .await
        .map_err(|e| service_core::error::AppError::DatabaseError(anyhow::anyhow!(e)))?;

    let store = Arc::new(PgStore::new(pool));

    let cache = Arc::new(
        RedisCache::connect(&config.redis.url)
            .await
            .map_err(service_core::error::AppError::InternalError)?,
    );
    tracing::info!("Cache initialized");

    let email = Arc::new(
        SmtpEmailService::new(
            &config.smtp.host,
            config.smtp.port,
            &config.smtp.username,
            &config.smtp.password,
            config.smtp.from_address.clone(),
            config.smtp.public_base_url.clone(),
        )
        .map_err(service_core::error::AppError::InternalError)?,
    );
    tracing::info!("Email service initialized");

    let tokens = TokenService::new(
        &config.jwt.secret,
        &config.jwt.algorithm,
        config.jwt.access_token_expiry_minutes,
        config.jwt.refresh_token_expiry_days,
    )
    .map_err(service_core::error::AppError::ConfigError)?;

    let audit = Arc::new(TracingAudit::new());

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
        email,
        audit.clone(),
        policy,
    );
    let teams = TeamService::new(store.clone(), store, audit);

    let login_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.login_attempts,
        config.rate_limit.login_window_seconds,
    );
    let register_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.register_attempts,
        config.rate_limit.register_window_seconds,
    );
    let password_reset_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.password_reset_attempts,
        config.rate_limit.password_reset_window_seconds,
    );
    let ip_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
    );
    tracing::info!("Rate limiters initialized");

    let state = AppState {
        config: config.clone(),
        auth,
        teams,
        login_rate_limiter,
        register_rate_limiter,
        password_reset_rate_limiter,
        ip_rate_limiter,
    };

    let app = build_router(state).await?;

    let addr = config.common.bind_addr();
    tracing::info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| service_core::error::AppError::InternalError(anyhow::anyhow!(e)))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| service_core::error::AppError::InternalError(anyhow::anyhow!(e)))?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
