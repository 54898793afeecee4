use crate::db;
use crate::domain::models::UserRole;
use crate::state::SharedState;
use crate::web::session::UserSession;
use crate::web::Message;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/message", post(send_message))
        .with_state(state)
}

#[derive(Deserialize)]
pub struct SendMessagePayload {
    pub message: String,
    pub region: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageResponse {
    message: String,
    message_id: Uuid,
}

async fn send_message(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<(StatusCode, Json<SendMessageResponse>), (StatusCode, Json<Message>)> {
    let requester = db::find_user_by_id(&state.pool, user_id)
        .await
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Message::new("Internal Server Error"),
            )
        })?
        .ok_or((StatusCode::UNAUTHORIZED, Message::new("Unauthorized")))?;
    if requester.role != UserRole::Manager {
        return Err((StatusCode::FORBIDDEN, Message::new("Unauthorized")));
    }

    let body = payload.message.trim().to_string();
    if body.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Message::new("Message content cannot be empty"),
        ));
    }
    let region = payload.region.trim().to_string();
    if region.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Message::new("Region cannot be empty"),
        ));
    }

    let internal = |e: sqlx::Error| {
        tracing::error!("Failed to store regional message: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Message::new("Internal Server Error"),
        )
    };

    let manager = db::find_manager_by_user(&state.pool, user_id)
        .await
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Message::new("Internal Server Error: Manager profile mismatch."),
            )
        })?
        .ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            Message::new("Internal Server Error: Manager profile mismatch."),
        ))?;

    let mut tx = state.pool.begin().await.map_err(internal)?;

    let message_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO regional_messages (message, region, created_by)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(&body)
    .bind(&region)
    .bind(manager.id)
    .fetch_one(&mut *tx)
    .await
    .map_err(internal)?;

    sqlx::query(
        r#"
        INSERT INTO action_logs (action_type, manager_id, details)
        VALUES ('MESSAGE_SENT', $1, $2)
        "#,
    )
    .bind(manager.id)
    .bind(json!({
        "messageId": message_id,
        "region": region,
        "messageLength": body.len(),
    }))
    .execute(&mut *tx)
    .await
    .map_err(internal)?;

    tx.commit().await.map_err(internal)?;

    // fire and forget: the response never waits on email delivery, and
    // individual failures are only visible in the logs
    let fanout_state = state.clone();
    let fanout_region = region.clone();
    tokio::spawn(async move {
        dispatch_regional_emails(fanout_state, message_id, fanout_region, body).await;
    });

    tracing::info!(
        "Manager {} created message {} for region {}",
        manager.id,
        message_id,
        region
    );

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            message: "Regional message created successfully. Email sending initiated.".to_string(),
            message_id,
        }),
    ))
}

async fn dispatch_regional_emails(
    state: SharedState,
    message_id: Uuid,
    region: String,
    body: String,
) {
    let recipients = match db::list_region_recipients(&state.pool, &region).await {
        Ok(recipients) => recipients,
        Err(e) => {
            tracing::error!(
                "Failed to load recipients for message {} in region {}: {}",
                message_id,
                region,
                e
            );
            return;
        }
    };
    if recipients.is_empty() {
        tracing::info!("No recipients with emails in region {}", region);
        return;
    }

    let mut success_count = 0usize;
    let mut error_count = 0usize;
    for email in recipients {
        match state.mailer.send_regional_message(&email, &body).await {
            Ok(()) => success_count += 1,
            Err(e) => {
                error_count += 1;
                tracing::error!("Failed to send regional message to {}: {}", email, e);
            }
        }
    }
    tracing::info!(
        "Regional message {} dispatched: {} sent, {} failed",
        message_id,
        success_count,
        error_count
    );
}
