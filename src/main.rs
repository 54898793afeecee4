mod analytics;
mod config;
mod db;
mod domain;
mod import;
mod middleware;
mod services;
mod state;
mod web;

use crate::config::AppConfig;
use crate::middleware::RateLimiter;
use crate::services::mailer::Mailer;
use crate::state::SharedState;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run database migrations: {}", e);
            e
        })?;
    tracing::info!("Database migrations completed");

    db::seed::seed_all(&pool, &config).await?;

    let mailer = Arc::new(Mailer::new(
        config.email_api_key.clone(),
        config.email_from.clone(),
    ));

    let session_key = config.session_key.clone();
    let shared: SharedState = Arc::new(state::AppState {
        pool,
        config,
        mailer,
        session_key,
        // 5 login attempts / minute per IP, 5 code requests and 5 verify
        // attempts per 10-minute code window
        login_limiter: RateLimiter::new(5, 60),
        code_request_limiter: RateLimiter::new(5, 600),
        verify_limiter: RateLimiter::new(5, 600),
    });

    // hourly sweep of stale rate-limiter windows
    let limiter_state = shared.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            limiter_state.login_limiter.cleanup().await;
            limiter_state.code_request_limiter.cleanup().await;
            limiter_state.verify_limiter.cleanup().await;
        }
    });

    let app = web::routes(shared.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = shared.config.bind_addr.clone();
    tracing::info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
