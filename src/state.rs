use crate::config::AppConfig;
use crate::middleware::RateLimiter;
use crate::services::mailer::Mailer;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: AppConfig,
    pub mailer: Arc<Mailer>,
    pub session_key: Vec<u8>,
    // Limiters live in shared state so their windows survive across requests.
    pub login_limiter: RateLimiter,
    pub code_request_limiter: RateLimiter,
    pub verify_limiter: RateLimiter,
}

pub type SharedState = Arc<AppState>;
