use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod auth;
mod config;
mod db;
mod dto;
mod error;
mod extract;
mod handlers;
mod models;
mod services;

use auth::rate_limit::RateLimitState;
use config::Config;
use services::kakao::KakaoClient;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub kakao: KakaoClient,
    pub rate_limiter: RateLimitState,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moodlog_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env());

    // Database
    let db = db::create_pool(&config.database_url).await;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations applied");

    let state = AppState {
        db,
        kakao: KakaoClient::new(&config),
        config: config.clone(),
        rate_limiter: RateLimitState::new(),
    };

    // Auth routes are public but rate limited per IP
    let auth_routes = Router::new()
        .route("/api/v1/auth/kakao/login", post(handlers::auth::kakao_login))
        .route("/api/v1/auth/refresh", post(handlers::auth::refresh))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::rate_limit::rate_limit_auth,
        ));

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz))
        .merge(auth_routes);

    let protected_routes = Router::new()
        // Diaries
        .route("/api/v1/diaries", post(handlers::diaries::create_diary))
        .route("/api/v1/diaries", get(handlers::diaries::list_diaries))
        .route("/api/v1/diaries/calendar", get(handlers::diaries::get_calendar))
        .route("/api/v1/diaries/today", get(handlers::diaries::get_today_diary))
        .route("/api/v1/diaries/:id", get(handlers::diaries::get_diary))
        .route("/api/v1/diaries/:id", put(handlers::diaries::update_diary))
        .route("/api/v1/diaries/:id", delete(handlers::diaries::delete_diary))
        // Analysis
        .route("/api/v1/analysis", post(handlers::analysis::create_analysis))
        .route("/api/v1/analysis", get(handlers::analysis::list_analyses))
        .route(
            "/api/v1/analysis/latest",
            get(handlers::analysis::get_latest_analysis),
        )
        .route("/api/v1/analysis/:id", get(handlers::analysis::get_analysis))
        .route(
            "/api/v1/analysis/:id/feedback",
            post(handlers::analysis::submit_feedback),
        )
        // App lock
        .route("/api/v1/lock", post(handlers::lock::create_lock))
        .route("/api/v1/lock", put(handlers::lock::update_lock))
        .route("/api/v1/lock", get(handlers::lock::get_lock_status))
        .route("/api/v1/lock", delete(handlers::lock::delete_lock))
        .route("/api/v1/lock/unlock", post(handlers::lock::unlock))
        // Users
        .route("/api/v1/users/me", get(handlers::users::me))
        .route("/api/v1/users/me", delete(handlers::users::withdraw))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    let allowed_origins: Vec<axum::http::HeaderValue> = {
        let mut origins = vec![config
            .frontend_url
            .parse::<axum::http::HeaderValue>()
            .expect("FRONTEND_URL must be a valid origin")];
        // In dev, also allow LAN access (e.g. testing from a device)
        if let Ok(extra) = std::env::var("CORS_EXTRA_ORIGINS") {
            for o in extra.split(',') {
                if let Ok(hv) = o.trim().parse::<axum::http::HeaderValue>() {
                    origins.push(hv);
                }
            }
        }
        origins
    };
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(true);

    // Background engine: drives processing jobs to completed/failed
    services::engine::spawn_analysis_worker(state.clone());

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listen address");
    // connect_info provides the client IP for rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .expect("Server error");
}
