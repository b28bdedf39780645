use careportal::{
    config::{validate_production_config, AppConfig},
    db, handlers,
    middleware::{rate_limit_middleware, RateLimiter},
    repositories::{
        OtpRepository, PendingRepository, SessionRepository, SqliteAccountRepository,
        SqliteOtpRepository, SqlitePendingRepository, SqliteSessionRepository,
    },
    services::{
        create_email_service, IdAllocator, OtpService, RegistrationService, SessionService,
        TokenService, SESSION_TTL_MINUTES,
    },
    AppState,
};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use careportal::services::EmailService;
use chrono::Utc;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "careportal=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    validate_production_config();

    // Database connection
    let pool = db::create_pool().await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Initialize repositories
    let account_repository = Arc::new(SqliteAccountRepository::new(pool.clone()));
    let pending_repository = Arc::new(SqlitePendingRepository::new(pool.clone()));
    let otp_repository = Arc::new(SqliteOtpRepository::new(pool.clone()));
    let session_repository = Arc::new(SqliteSessionRepository::new(pool.clone()));

    // Initialize services
    let email_service: Arc<dyn EmailService> = Arc::from(create_email_service());
    let otp_service = Arc::new(OtpService::new(
        otp_repository.clone(),
        account_repository.clone(),
        pending_repository.clone(),
        email_service,
    ));
    let allocator = IdAllocator::new(account_repository.clone(), pending_repository.clone());
    let registration_service = Arc::new(RegistrationService::new(
        account_repository.clone(),
        pending_repository.clone(),
        allocator,
        otp_service.clone(),
    ));
    let token_service = Arc::new(TokenService::new(&config.jwt_secret, SESSION_TTL_MINUTES));
    let session_service = Arc::new(SessionService::new(
        account_repository.clone(),
        session_repository.clone(),
        token_service,
    ));

    let app_state = AppState {
        registration_service,
        session_service,
        otp_service,
        account_repository,
        pending_repository: pending_repository.clone(),
        otp_repository: otp_repository.clone(),
        session_repository: session_repository.clone(),
        pool: pool.clone(),
    };

    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_max_attempts,
        config.rate_limit_window_secs,
    ));

    // Periodic sweep of expired pending registrations, OTP codes, sessions,
    // and idle rate-limiter keys. Read paths filter on expiry themselves, so
    // this only keeps the tables and maps from growing.
    let sweep_limiter = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let now = Utc::now();
            if let Err(e) = pending_repository.purge_expired(now).await {
                tracing::warn!("failed to purge expired pending registrations: {e}");
            }
            if let Err(e) = otp_repository.purge_expired(now).await {
                tracing::warn!("failed to purge expired OTP codes: {e}");
            }
            if let Err(e) = session_repository.purge_expired(now).await {
                tracing::warn!("failed to purge expired sessions: {e}");
            }
            sweep_limiter.prune();
        }
    });

    // Credential-bearing routes sit behind the rate limiter.
    let limited_routes = Router::new()
        .route("/auth/register", post(handlers::auth_handlers::register))
        .route("/auth/send-otp", post(handlers::auth_handlers::send_otp))
        .route("/auth/verify-otp", post(handlers::auth_handlers::verify_otp))
        .route("/auth/login", post(handlers::auth_handlers::login))
        .route(
            "/auth/forgot-password",
            post(handlers::auth_handlers::forgot_password),
        )
        .route(
            "/auth/reset-password",
            post(handlers::auth_handlers::reset_password),
        )
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let session_routes = Router::new()
        .route(
            "/auth/validate-token",
            post(handlers::auth_handlers::validate_token),
        )
        .route("/auth/logout", post(handlers::auth_handlers::logout))
        .route("/auth/logout-all", post(handlers::auth_handlers::logout_all))
        .route("/auth/sessions", get(handlers::auth_handlers::list_sessions));

    let admin_routes = Router::new()
        .route(
            "/admin/pending-users",
            get(handlers::admin_handlers::list_pending),
        )
        .route(
            "/admin/pending-users/{user_id}",
            axum::routing::delete(handlers::admin_handlers::delete_pending),
        )
        .route(
            "/admin/pending-users/{user_id}/resend-otp",
            post(handlers::admin_handlers::resend_otp),
        )
        .route("/admin/status", get(handlers::admin_handlers::status));

    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(limited_routes)
        .merge(session_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
