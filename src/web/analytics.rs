use crate::analytics::{aggregate, AnalyticsSummary};
use crate::db;
use crate::domain::models::UserRole;
use crate::state::SharedState;
use crate::web::session::UserSession;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub fn admin_router(state: SharedState) -> Router {
    Router::new()
        .route("/analytics", get(admin_analytics))
        .with_state(state)
}

pub fn manager_router(state: SharedState) -> Router {
    Router::new()
        .route("/analytics", get(manager_analytics))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyticsParams {
    focus_group_id: Option<Uuid>,
}

#[derive(Serialize)]
struct AnalyticsResponse {
    analytics: AnalyticsSummary,
}

async fn admin_analytics(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<AnalyticsResponse>, StatusCode> {
    let requester = db::find_user_by_id(&state.pool, user_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to find user {} for analytics: {}", user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;
    if requester.role != UserRole::Admin {
        return Err(StatusCode::FORBIDDEN);
    }

    tracing::debug!(
        "admin analytics request, focus group filter: {:?}",
        params.focus_group_id
    );

    let records = db::load_submission_records(&state.pool, params.focus_group_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load submissions for analytics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(AnalyticsResponse {
        analytics: aggregate(&records, Utc::now()),
    }))
}

/// Analytics scoped to the requesting manager's assigned focus group.
/// 403 for non-managers, 400 for managers without an assignment.
async fn manager_analytics(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<AnalyticsResponse>, StatusCode> {
    let requester = db::find_user_by_id(&state.pool, user_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;
    if requester.role != UserRole::Manager {
        return Err(StatusCode::FORBIDDEN);
    }

    let manager = db::find_manager_by_user(&state.pool, user_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::FORBIDDEN)?;

    let group = db::find_group_for_manager(&state.pool, manager.id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::BAD_REQUEST)?;

    let records = db::load_submission_records(&state.pool, Some(group.id))
        .await
        .map_err(|e| {
            tracing::error!(
                "Failed to load submissions for manager group {}: {}",
                group.id,
                e
            );
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(AnalyticsResponse {
        analytics: aggregate(&records, Utc::now()),
    }))
}
