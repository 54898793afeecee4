pub mod admin;
pub mod analytics;
pub mod auth;
pub mod checkin;
pub mod manager;
pub mod session;

use crate::state::SharedState;
use axum::{routing::get, Json, Router};
use serde::Serialize;

/// Error/status body shared by the JSON endpoints.
#[derive(Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(state.clone()))
        .nest("/checkin", checkin::router(state.clone()))
        .nest(
            "/admin",
            admin::router(state.clone()).merge(analytics::admin_router(state.clone())),
        )
        .nest(
            "/manager",
            manager::router(state.clone()).merge(analytics::manager_router(state)),
        )
}
